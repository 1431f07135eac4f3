use localynk::{
    error::AppError,
    payments::{BillingInfo, CheckoutGateway, CheckoutRequest, CheckoutStatus, PayMongoClient},
};
use serde_json::json;
use wiremock::{
    matchers::{basic_auth, body_partial_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn client(server: &MockServer) -> PayMongoClient {
    PayMongoClient::new("sk_test_123".to_string(), server.uri(), "PHP".to_string())
}

fn request(amount: &str) -> CheckoutRequest {
    CheckoutRequest {
        amount: amount.parse().unwrap(),
        description: "Down payment".to_string(),
        billing: BillingInfo {
            name: "Ana Reyes".to_string(),
            email: "ana@example.com".to_string(),
            phone: None,
        },
        method_hint: Some("GCash".to_string()),
    }
}

#[tokio::test]
async fn creates_payment_link_in_centavos() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/links"))
        .and(basic_auth("sk_test_123", ""))
        .and(body_partial_json(json!({
            "data": { "attributes": {
                "amount": 39000,
                "currency": "PHP",
                "remarks": "GCash",
                "billing": { "email": "ana@example.com" }
            }}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "link_abc",
                "attributes": {
                    "checkout_url": "https://pm.link/localynk/abc",
                    "reference_number": "Xk92Lq",
                    "status": "unpaid"
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server).create_checkout(request("390.00")).await.unwrap();

    assert_eq!(session.reference, "Xk92Lq");
    assert_eq!(session.checkout_url, "https://pm.link/localynk/abc");
    assert_eq!(session.raw["data"]["id"], "link_abc");
}

#[tokio::test]
async fn rejected_request_is_a_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/links"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{ "code": "parameter_below_minimum", "detail": "amount too small" }]
        })))
        .mount(&server)
        .await;

    let result = client(&server).create_checkout(request("1.00")).await;

    assert!(matches!(result, Err(AppError::Gateway(_))));
}

#[tokio::test]
async fn link_without_checkout_url_is_a_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/links"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "attributes": { "reference_number": "Xk92Lq" } }
        })))
        .mount(&server)
        .await;

    let result = client(&server).create_checkout(request("390.00")).await;

    assert!(matches!(result, Err(AppError::Gateway(_))));
}

#[tokio::test]
async fn retrieves_link_status_by_reference() {
    let server = MockServer::start().await;
    for (reference, status) in [("paid1", "paid"), ("open1", "unpaid"), ("gone1", "archived")] {
        Mock::given(method("GET"))
            .and(path("/links"))
            .and(query_param("reference_number", reference))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "attributes": { "reference_number": reference, "status": status } }]
            })))
            .mount(&server)
            .await;
    }

    let client = client(&server);
    assert_eq!(client.retrieve_checkout("paid1").await.unwrap(), CheckoutStatus::Paid);
    assert_eq!(client.retrieve_checkout("open1").await.unwrap(), CheckoutStatus::Pending);
    assert_eq!(client.retrieve_checkout("gone1").await.unwrap(), CheckoutStatus::Failed);
}

#[tokio::test]
async fn unknown_reference_is_a_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/links"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let result = client(&server).retrieve_checkout("missing").await;

    assert!(matches!(result, Err(AppError::Gateway(_))));
}

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{body_json, date_in, link_event, TestApp};
use hmac::{Hmac, Mac};
use localynk::{
    config::Settings,
    domain::{BookingStatus, PaymentStatus},
    payments::CheckoutStatus,
};
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;

fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("session={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn sign(secret: &str, timestamp: &str, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, body).as_bytes());
    format!("t={},te={},li=", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn health_reports_database_reachable() {
    let app = TestApp::new().await;

    let response = app.router().oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn booking_routes_require_a_session() {
    let app = TestApp::new().await;

    let response = app.router().oneshot(get("/api/bookings", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(get("/api/bookings", Some("not-a-real-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_then_fetch_booking_over_http() {
    let app = TestApp::new().await;
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let dest = app.destination("Siargao").await;
    let token = app.token_for(&tourist).await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            Some(&token),
            json!({
                "guide": guide.id,
                "destination": dest,
                "check_in": date_in(10),
                "check_out": date_in(12),
                "num_guests": 3
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["status"], "Pending_Payment");
    assert_eq!(created["total_price"], "1300.00");
    assert_eq!(created["down_payment"], "390.00");

    let id = created["id"].as_str().unwrap().to_string();
    let response = app
        .router()
        .oneshot(get(&format!("/api/bookings/{}", id), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], id.as_str());
}

#[tokio::test]
async fn invalid_booking_is_unprocessable() {
    let app = TestApp::new().await;
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let agency = app.agency("islandtours").await;
    let dest = app.destination("Siargao").await;
    let token = app.token_for(&tourist).await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            Some(&token),
            json!({
                "guide": guide.id,
                "agency": agency.id,
                "destination": dest,
                "check_in": date_in(10),
                "check_out": date_in(12),
                "num_guests": 2
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Agency"));
}

#[tokio::test]
async fn invalid_transition_names_both_states() {
    let app = TestApp::new().await;
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let dest = app.destination("Siargao").await;
    let booking = app.book_guide(&tourist, &guide, dest, date_in(10), 2, 2).await;
    app.ctx
        .booking_service
        .transition(&guide, booking.id, BookingStatus::Declined)
        .await
        .unwrap();
    let token = app.token_for(&guide).await;

    let response = app
        .router()
        .oneshot(json_request(
            "PUT",
            &format!("/api/bookings/{}/status", booking.id),
            Some(&token),
            json!({ "status": "Accepted" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["current_status"], "Declined");
    assert_eq!(body["requested_status"], "Accepted");
}

#[tokio::test]
async fn guide_blocked_dates_are_public() {
    let app = TestApp::new().await;
    let guide = app.guide("ben").await;

    let response = app
        .router()
        .oneshot(get(&format!("/api/guides/{}/blocked-dates", guide.id), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["blocked_dates"], json!([]));
}

#[tokio::test]
async fn admin_routes_reject_other_roles() {
    let app = TestApp::new().await;
    let tourist = app.tourist("ana").await;
    let admin = app.admin("root").await;

    let token = app.token_for(&tourist).await;
    let response = app
        .router()
        .oneshot(json_request("POST", "/api/admin/sweep", Some(&token), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = app.token_for(&admin).await;
    let response = app
        .router()
        .oneshot(json_request("POST", "/api/admin/sweep", Some(&token), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["purged"], 0);
}

#[tokio::test]
async fn initiate_payment_over_http() {
    let app = TestApp::new().await;
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let dest = app.destination("Siargao").await;
    let booking = app.book_guide(&tourist, &guide, dest, date_in(10), 2, 3).await;
    let token = app.token_for(&tourist).await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/payments/initiate",
            Some(&token),
            json!({ "booking_id": booking.id }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["amount"], "390.00");
    assert_eq!(body["transaction_id"], "fake-ref-1");
    assert_eq!(body["checkout_url"], "https://checkout.test/fake-ref-1");
}

#[tokio::test]
async fn unsigned_webhook_is_refused_when_secret_configured() {
    let mut settings = Settings::default();
    settings.paymongo.webhook_secret = Some("whsk_test".to_string());
    let app = TestApp::with_settings(settings).await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/payments/webhook",
            None,
            link_event("fake-ref-1", "paid"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = link_event("fake-ref-1", "paid").to_string();
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("paymongo-signature", sign("wrong", "1700000000", &body))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_webhook_confirms_booking() {
    let mut settings = Settings::default();
    settings.paymongo.webhook_secret = Some("whsk_test".to_string());
    let app = TestApp::with_settings(settings).await;
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let dest = app.destination("Siargao").await;
    let booking = app.book_guide(&tourist, &guide, dest, date_in(10), 2, 3).await;
    let initiated = app.pay_for(&tourist, &booking).await;

    let body = link_event(&initiated.transaction_id, "paid").to_string();
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .header("paymongo-signature", sign("whsk_test", "1700000000", &body))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["received"], true);
    assert_eq!(result["result"], "confirmed");
    assert_eq!(app.booking(booking.id).await.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn unsigned_webhook_is_checked_with_the_gateway() {
    let app = TestApp::new().await;
    assert!(app.settings.paymongo.webhook_secret.is_none());
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let dest = app.destination("Siargao").await;
    let booking = app.book_guide(&tourist, &guide, dest, date_in(10), 2, 3).await;
    let initiated = app.pay_for(&tourist, &booking).await;

    for forged in ["paid", "failed"] {
        let response = app
            .router()
            .oneshot(json_request(
                "POST",
                "/api/payments/webhook",
                None,
                json!({ "reference_number": initiated.transaction_id, "status": forged }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"], "pending");
    }
    assert_eq!(app.booking(booking.id).await.status, BookingStatus::PendingPayment);
    let payment = app.ctx.payment_repo.find_by_id(initiated.payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    app.gateway.set_status(&initiated.transaction_id, CheckoutStatus::Paid);
    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/payments/webhook",
            None,
            link_event(&initiated.transaction_id, "paid"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["result"], "confirmed");
    assert_eq!(app.booking(booking.id).await.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn unsigned_webhook_without_gateway_is_unavailable() {
    let app = TestApp::without_gateway().await;
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let dest = app.destination("Siargao").await;
    let booking = app.book_guide(&tourist, &guide, dest, date_in(10), 2, 3).await;
    sqlx::query(
        "INSERT INTO payments (id, payer_id, payment_type, related_booking_id, amount, payment_method, gateway_transaction_id, status, timestamp) \
         VALUES (?, ?, 'Booking', ?, '390.00', 'GCash', 'manual-ref', 'pending', ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(tourist.id.to_string())
    .bind(booking.id.to_string())
    .bind(chrono::Utc::now().naive_utc())
    .execute(&app.pool)
    .await
    .unwrap();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/payments/webhook",
            None,
            link_event("manual-ref", "paid"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.booking(booking.id).await.status, BookingStatus::PendingPayment);
}

#[tokio::test]
async fn webhook_for_unknown_payment_is_acknowledged() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/payments/webhook",
            None,
            json!({ "reference_number": "unknown", "status": "paid" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["result"], "payment_not_found");
}

#[tokio::test]
async fn malformed_webhook_is_a_bad_request() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{InitiatePaymentRequest, InitiatedPayment, Payment, PaymentStatus, PaymentType},
    error::{AppError, Result},
    payments,
};

pub const SIGNATURE_HEADER: &str = "paymongo-signature";

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    id: Uuid,
    status: PaymentStatus,
    payment_type: PaymentType,
    amount: Decimal,
    related_booking_id: Option<Uuid>,
    checkout_url: Option<String>,
}

impl From<Payment> for PaymentStatusResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            status: payment.status,
            payment_type: payment.payment_type,
            amount: payment.amount,
            related_booking_id: payment.related_booking_id,
            checkout_url: payment.checkout_url,
        }
    }
}

pub async fn initiate(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<InitiatedPayment>)> {
    let initiated = state
        .service_context
        .payment_service
        .initiate(&user.account, request)
        .await?;

    Ok((StatusCode::CREATED, Json(initiated)))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<PaymentStatusResponse>>> {
    let payments = state
        .service_context
        .payment_service
        .history(&user.account)
        .await?;

    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentStatusResponse>> {
    let payment = state
        .service_context
        .payment_service
        .status(&user.account, id)
        .await?;

    Ok(Json(payment.into()))
}

/// Gateway push callback. Unauthenticated; trusted through the signature
/// header when a webhook secret is configured, otherwise re-checked with the
/// gateway before it can settle a payment.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signed = match state.settings.paymongo.webhook_secret.as_deref() {
        Some(secret) => {
            let signature = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(AppError::Unauthorized)?;

            if !payments::verify_signature(signature, &body, secret) {
                tracing::warn!("Rejected payment callback with bad signature");
                return Err(AppError::Unauthorized);
            }
            true
        }
        None => false,
    };

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid callback body: {}", e)))?;

    let payment_service = &state.service_context.payment_service;
    let outcome = if signed {
        payment_service.handle_callback(&payload).await?
    } else {
        payment_service.handle_unsigned_callback(&payload).await?
    };

    Ok(Json(json!({
        "received": true,
        "result": outcome.label(),
    })))
}

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Duration;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{api::state::AppState, domain::Booking, error::Result};

#[derive(Debug, Deserialize)]
pub struct PayoutUpdate {
    is_payout_settled: bool,
}

pub async fn set_payout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<PayoutUpdate>,
) -> Result<Json<Booking>> {
    let booking = state
        .service_context
        .booking_service
        .set_payout_settled(id, update.is_payout_settled)
        .await?;

    Ok(Json(booking))
}

pub async fn run_sweep(State(state): State<AppState>) -> Result<Json<Value>> {
    let timeout = Duration::minutes(state.settings.booking.pending_payment_timeout_minutes);
    let purged = state
        .service_context
        .sweep_service
        .purge_stale_pending(timeout)
        .await?;

    Ok(Json(json!({ "purged": purged })))
}

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{AssignStaffRequest, Booking, BookingStatus, CreateBookingRequest, RescheduleBookingRequest},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    bookings: Vec<Booking>,
    total: usize,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    status: BookingStatus,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>)> {
    let booking = state
        .service_context
        .booking_service
        .create(&user.account, request)
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let bookings = state
        .service_context
        .booking_service
        .list_for(&user.account, params.limit, params.offset)
        .await?;

    let total = bookings.len();
    Ok(Json(ListResponse { bookings, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>> {
    let booking = state
        .service_context
        .booking_service
        .get(&user.account, id)
        .await?;

    Ok(Json(booking))
}

pub async fn reschedule(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<RescheduleBookingRequest>,
) -> Result<Json<Booking>> {
    let booking = state
        .service_context
        .booking_service
        .reschedule(&user.account, id, request)
        .await?;

    Ok(Json(booking))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Booking>> {
    let booking = state
        .service_context
        .booking_service
        .transition(&user.account, id, update.status)
        .await?;

    Ok(Json(booking))
}

pub async fn assign_staff(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignStaffRequest>,
) -> Result<Json<Booking>> {
    let booking = state
        .service_context
        .booking_service
        .assign_staff(&user.account, id, request)
        .await?;

    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
pub struct BlockedDatesParams {
    from: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct BlockedDatesResponse {
    guide_id: Uuid,
    blocked_dates: Vec<NaiveDate>,
}

pub async fn blocked_dates(
    State(state): State<AppState>,
    Path(guide_id): Path<Uuid>,
    Query(params): Query<BlockedDatesParams>,
) -> Result<Json<BlockedDatesResponse>> {
    let blocked_dates = state
        .service_context
        .booking_service
        .blocked_dates(guide_id, params.from)
        .await?;

    Ok(Json(BlockedDatesResponse {
        guide_id,
        blocked_dates,
    }))
}

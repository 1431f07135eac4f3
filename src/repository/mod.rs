use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::*;
use crate::error::{AppError, Result};

pub mod account_repository;
pub mod booking_repository;
pub mod catalog_repository;
pub mod payment_repository;

pub use account_repository::SqliteAccountRepository;
pub use booking_repository::SqliteBookingRepository;
pub use catalog_repository::SqliteCatalogRepository;
pub use payment_repository::SqlitePaymentRepository;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: Booking) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Booking>>;
    async fn list_for_tourist(&self, tourist_id: Uuid) -> Result<Vec<Booking>>;
    async fn list_for_provider(&self, provider_id: Uuid) -> Result<Vec<Booking>>;
    async fn set_assigned_staff(&self, id: Uuid, staff: &AssignStaffRequest) -> Result<Booking>;
    async fn set_payout_settled(&self, id: Uuid, settled: bool) -> Result<Booking>;
    async fn confirmed_stays_for_guide(&self, guide_id: Uuid, from: NaiveDate) -> Result<Vec<StayWindow>>;
    async fn delete_stale_pending(&self, created_before: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_gateway_reference(&self, reference: &str) -> Result<Option<Payment>>;
    async fn list_for_payer(&self, payer_id: Uuid) -> Result<Vec<Payment>>;
    /// Flips a pending payment to `failed`. Returns false when the payment
    /// had already been resolved.
    async fn mark_failed(&self, id: Uuid, payload: &serde_json::Value) -> Result<bool>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_destination(&self, id: Uuid) -> Result<Option<Destination>>;
    async fn find_accommodation(&self, id: Uuid) -> Result<Option<Accommodation>>;
    async fn find_tour_package(&self, id: Uuid) -> Result<Option<TourPackage>>;
    /// Newest active package the guide offers for the destination.
    async fn find_package_for(&self, guide_id: Uuid, destination_id: Uuid) -> Result<Option<TourPackage>>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_money(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .map_err(|e| AppError::Database(format!("Invalid amount {:?}: {}", s, e)))
}

pub(crate) fn parse_opt_money(s: Option<String>) -> Result<Option<Decimal>> {
    s.as_deref().map(parse_money).transpose()
}

pub(crate) fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

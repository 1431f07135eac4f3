use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::StayWindow,
    error::Result,
    repository::{BookingRepository, SqliteBookingRepository},
};

/// Only `Confirmed` bookings hold a guide's calendar. Stays are half-open,
/// so a checkout day is free for the next check-in.
pub struct AvailabilityChecker {
    pool: SqlitePool,
    booking_repo: Arc<dyn BookingRepository>,
}

impl AvailabilityChecker {
    pub fn new(pool: SqlitePool, booking_repo: Arc<dyn BookingRepository>) -> Self {
        Self { pool, booking_repo }
    }

    pub async fn is_available(
        &self,
        guide_id: Uuid,
        stay: &StayWindow,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::is_available_on(&mut conn, guide_id, stay, exclude_booking_id).await
    }

    /// Same check on a caller-held connection, so it can run inside the
    /// transaction that commits a confirmation.
    pub async fn is_available_on(
        conn: &mut SqliteConnection,
        guide_id: Uuid,
        stay: &StayWindow,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<bool> {
        let taken =
            SqliteBookingRepository::has_confirmed_overlap(conn, guide_id, stay, exclude_booking_id)
                .await?;
        Ok(!taken)
    }

    /// Dates on or after `from` reserved by the guide's confirmed bookings.
    pub async fn blocked_dates(&self, guide_id: Uuid, from: NaiveDate) -> Result<Vec<NaiveDate>> {
        let stays = self.booking_repo.confirmed_stays_for_guide(guide_id, from).await?;

        let dates: BTreeSet<NaiveDate> = stays
            .iter()
            .flat_map(|stay| stay.reserved_dates())
            .filter(|day| *day >= from)
            .collect();

        Ok(dates.into_iter().collect())
    }
}

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{error::Result, repository::BookingRepository};

/// Reclaims `Pending_Payment` bookings whose payment window lapsed.
pub struct SweepService {
    booking_repo: Arc<dyn BookingRepository>,
}

impl SweepService {
    pub fn new(booking_repo: Arc<dyn BookingRepository>) -> Self {
        Self { booking_repo }
    }

    pub async fn purge_stale_pending(&self, timeout: Duration) -> Result<u64> {
        let cutoff = Utc::now() - timeout;
        let purged = self.booking_repo.delete_stale_pending(cutoff).await?;

        if purged > 0 {
            tracing::info!(purged, cutoff = %cutoff, "Purged stale Pending_Payment bookings");
        } else {
            tracing::debug!(cutoff = %cutoff, "No stale Pending_Payment bookings");
        }
        Ok(purged)
    }
}

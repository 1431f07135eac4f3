//! Booking status transitions.
//!
//! Every status write, and every counter or amount that moves with a
//! status, goes through [`BookingStateMachine::apply`].

use std::sync::Arc;

use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::{
    domain::{
        Account, Actor, Booking, BookingStatus, BookingTarget, Commission, PriceQuote, StayWindow,
        ValidationError,
    },
    error::{AppError, Result},
    notifications::{Alert, NotificationManager, RelatedEntity},
    repository::{
        account_repository::BookingCounter, CatalogRepository, SqliteAccountRepository,
        SqliteBookingRepository, SqlitePaymentRepository,
    },
    service::AvailabilityChecker,
};

#[derive(Debug)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub alerts: Vec<Alert>,
}

pub struct BookingStateMachine {
    pool: SqlitePool,
    catalog_repo: Arc<dyn CatalogRepository>,
    notifications: Arc<NotificationManager>,
    gate: Mutex<()>,
}

impl BookingStateMachine {
    pub fn new(
        pool: SqlitePool,
        catalog_repo: Arc<dyn CatalogRepository>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self {
            pool,
            catalog_repo,
            notifications,
            gate: Mutex::new(()),
        }
    }

    /// Serialises status changes across the process. Hold it for the whole
    /// read-check-write transaction.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// The account that owns the booked service: the guide, the agency or
    /// the accommodation's host.
    pub async fn provider_of(&self, booking: &Booking) -> Result<Uuid> {
        match &booking.target {
            BookingTarget::GuideTrip { guide_id, .. } => Ok(*guide_id),
            BookingTarget::AgencyTrip { agency_id, .. } => Ok(*agency_id),
            BookingTarget::Accommodation { accommodation_id } => self
                .catalog_repo
                .find_accommodation(*accommodation_id)
                .await?
                .map(|a| a.host_id)
                .ok_or_else(|| AppError::NotFound("Accommodation not found".to_string())),
        }
    }

    /// Roles `account` holds on `booking`, most privileged first.
    pub fn actors_for(account: &Account, booking: &Booking, provider_id: Uuid) -> Vec<Actor> {
        let mut actors = Vec::new();
        if account.is_admin {
            actors.push(Actor::Admin);
        }
        if account.id == provider_id {
            actors.push(Actor::Provider);
        }
        if account.id == booking.tourist_id {
            actors.push(Actor::Tourist);
        }
        actors
    }

    /// Writes new dates and amounts onto an unconfirmed booking.
    ///
    /// Refused while a checkout for the booking is open, since that checkout
    /// was opened for the old amount.
    pub async fn reschedule(
        &self,
        booking_id: Uuid,
        stay: StayWindow,
        num_guests: u32,
        quote: PriceQuote,
    ) -> Result<Booking> {
        let _gate = self.lock().await;
        let mut tx = self.pool.begin().await?;

        if SqlitePaymentRepository::has_pending_for_booking(&mut *tx, booking_id).await? {
            return Err(AppError::Conflict(
                "A checkout is open for this booking; it cannot be changed until it settles".to_string(),
            ));
        }
        if !SqliteBookingRepository::write_schedule(&mut *tx, booking_id, stay, num_guests, &quote).await? {
            return Err(AppError::Conflict("The booking can no longer be changed".to_string()));
        }

        let booking = SqliteBookingRepository::fetch(&mut *tx, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking_id,
            total_price = %booking.total_price,
            "Booking rescheduled"
        );
        Ok(booking)
    }

    /// A user-driven status change: accept, decline, cancel, complete or
    /// refund. Confirmation only happens through payment reconciliation.
    pub async fn transition(
        &self,
        booking_id: Uuid,
        account: &Account,
        next: BookingStatus,
    ) -> Result<Booking> {
        let current = {
            let mut conn = self.pool.acquire().await?;
            SqliteBookingRepository::fetch(&mut conn, booking_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?
        };
        let provider_id = self.provider_of(&current).await?;

        let actors = Self::actors_for(account, &current, provider_id);
        if actors.is_empty() {
            return Err(AppError::Forbidden);
        }

        let outcome = {
            let _gate = self.lock().await;
            let mut tx = self.pool.begin().await?;

            let booking = SqliteBookingRepository::fetch(&mut *tx, booking_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

            if !booking.status.can_transition_to(next) {
                return Err(AppError::InvalidTransition {
                    from: booking.status,
                    to: next,
                });
            }
            let actor = actors
                .iter()
                .copied()
                .find(|a| a.may_request(booking.status, next))
                .ok_or(AppError::Forbidden)?;

            let outcome = Self::apply(&mut *tx, booking, provider_id, actor, next).await?;
            tx.commit().await?;
            outcome
        };

        tracing::info!(
            booking_id = %booking_id,
            user_id = %account.id,
            status = %next,
            "Booking status changed"
        );

        self.notifications.dispatch(outcome.alerts).await;
        Ok(outcome.booking)
    }

    /// Checks and writes one transition on the caller's connection. Writes
    /// nothing when it returns an error, so callers holding a transaction
    /// can recover from a rejection.
    pub async fn apply(
        conn: &mut SqliteConnection,
        booking: Booking,
        provider_id: Uuid,
        actor: Actor,
        next: BookingStatus,
    ) -> Result<TransitionOutcome> {
        let from = booking.status;
        if !from.can_transition_to(next) {
            return Err(AppError::InvalidTransition { from, to: next });
        }
        if !actor.may_request(from, next) {
            return Err(AppError::Forbidden);
        }

        let related = RelatedEntity::Booking(booking.id);
        let mut alerts = Vec::new();

        match next {
            BookingStatus::Accepted => {
                SqliteBookingRepository::write_status(conn, booking.id, next).await?;
                SqliteAccountRepository::increment_counter(conn, provider_id, BookingCounter::Accepted)
                    .await?;
                alerts.push(Alert::new(
                    booking.tourist_id,
                    "Booking accepted",
                    format!(
                        "Your booking for {} to {} was accepted. Pay the down payment of {} to confirm it.",
                        booking.stay.check_in(),
                        booking.stay.check_out(),
                        booking.down_payment
                    ),
                    related,
                ));
            }
            BookingStatus::Declined => {
                SqliteBookingRepository::write_status(conn, booking.id, next).await?;
                alerts.push(Alert::new(
                    booking.tourist_id,
                    "Booking declined",
                    format!(
                        "Your booking for {} to {} was declined.",
                        booking.stay.check_in(),
                        booking.stay.check_out()
                    ),
                    related,
                ));
            }
            BookingStatus::Confirmed => {
                if let Some(guide_id) = booking.target.guide_id() {
                    let available = AvailabilityChecker::is_available_on(
                        conn,
                        guide_id,
                        &booking.stay,
                        Some(booking.id),
                    )
                    .await?;
                    if !available {
                        return Err(ValidationError::DatesUnavailable {
                            check_in: booking.stay.check_in(),
                            check_out: booking.stay.check_out(),
                        }
                        .into());
                    }
                }

                let commission = Commission::compute(booking.total_price, booking.down_payment);
                SqliteBookingRepository::write_confirmation(conn, booking.id, &commission).await?;
                SqliteAccountRepository::increment_counter(conn, provider_id, BookingCounter::Confirmed)
                    .await?;

                alerts.push(Alert::new(
                    booking.tourist_id,
                    "Booking confirmed",
                    format!(
                        "Your down payment of {} was received. The remaining balance of {} is paid directly to your provider.",
                        booking.down_payment, booking.balance_due
                    ),
                    related,
                ));
                alerts.push(Alert::new(
                    provider_id,
                    "New confirmed booking",
                    format!(
                        "A booking for {} to {} is confirmed. Your payout is {}.",
                        booking.stay.check_in(),
                        booking.stay.check_out(),
                        commission.guide_payout_amount
                    ),
                    related,
                ));
            }
            BookingStatus::Cancelled => {
                SqliteBookingRepository::write_status(conn, booking.id, next).await?;
                let message = format!(
                    "The booking for {} to {} was cancelled.",
                    booking.stay.check_in(),
                    booking.stay.check_out()
                );
                match actor {
                    Actor::Tourist => {
                        alerts.push(Alert::new(provider_id, "Booking cancelled", message, related))
                    }
                    Actor::Admin if from == BookingStatus::Confirmed => {
                        alerts.push(Alert::new(provider_id, "Booking cancelled", message.clone(), related));
                        alerts.push(Alert::new(booking.tourist_id, "Booking cancelled", message, related));
                    }
                    Actor::Admin | Actor::Provider => {
                        alerts.push(Alert::new(booking.tourist_id, "Booking cancelled", message, related))
                    }
                    // The reconciler sends its own refund notice.
                    Actor::PaymentHandler => {}
                }
            }
            BookingStatus::Completed => {
                SqliteBookingRepository::write_completion(conn, booking.id).await?;
                alerts.push(Alert::new(
                    booking.tourist_id,
                    "Booking completed",
                    "Your provider marked the booking as fully paid. Thanks for travelling with us.",
                    related,
                ));
            }
            BookingStatus::Refunded => {
                SqliteBookingRepository::write_status(conn, booking.id, next).await?;
                alerts.push(Alert::new(
                    booking.tourist_id,
                    "Booking refunded",
                    format!("Your down payment of {} is being refunded.", booking.down_payment),
                    related,
                ));
            }
            BookingStatus::PendingPayment => {
                return Err(AppError::InvalidTransition { from, to: next });
            }
        }

        let booking = SqliteBookingRepository::fetch(conn, booking.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        Ok(TransitionOutcome { booking, alerts })
    }
}

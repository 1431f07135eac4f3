//! Turns a gateway result into committed Payment and Booking state.
//!
//! Webhook callbacks and status polls both end up in
//! [`PaymentReconciler::reconcile`]. Delivery is at-least-once and may race;
//! the payment row only leaves `pending` once, and only inside the
//! transaction that applies its effects.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Actor, Booking, BookingStatus, Payment, PaymentStatus, PaymentType},
    error::Result,
    notifications::{Alert, NotificationManager, RelatedEntity},
    payments::{CheckoutStatus, CheckoutUpdate},
    repository::{
        BookingRepository, PaymentRepository, SqliteAccountRepository, SqliteBookingRepository,
        SqlitePaymentRepository,
    },
    service::BookingStateMachine,
};

#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    PaymentNotFound,
    /// The gateway has not settled the checkout yet; nothing changed.
    StillPending,
    /// The payment was already resolved; nothing changed.
    Duplicate(PaymentStatus),
    Failed,
    Confirmed(Booking),
    SubscriptionExtended { expires_at: DateTime<Utc> },
    /// Money was captured but the booking could not be confirmed.
    RefundRequired { booking_id: Option<Uuid> },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::PaymentNotFound => "payment_not_found",
            ReconcileOutcome::StillPending => "pending",
            ReconcileOutcome::Duplicate(_) => "duplicate",
            ReconcileOutcome::Failed => "failed",
            ReconcileOutcome::Confirmed(_) => "confirmed",
            ReconcileOutcome::SubscriptionExtended { .. } => "subscription_extended",
            ReconcileOutcome::RefundRequired { .. } => "refund_required",
        }
    }
}

pub struct PaymentReconciler {
    pool: SqlitePool,
    payment_repo: Arc<dyn PaymentRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    state_machine: Arc<BookingStateMachine>,
    notifications: Arc<NotificationManager>,
}

impl PaymentReconciler {
    pub fn new(
        pool: SqlitePool,
        payment_repo: Arc<dyn PaymentRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        state_machine: Arc<BookingStateMachine>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self {
            pool,
            payment_repo,
            booking_repo,
            state_machine,
            notifications,
        }
    }

    pub async fn reconcile(&self, update: &CheckoutUpdate, payload: &Value) -> Result<ReconcileOutcome> {
        let gateway_reference = update.reference.as_str();
        let Some(payment) = self
            .payment_repo
            .find_by_gateway_reference(gateway_reference)
            .await?
        else {
            tracing::warn!(gateway_reference = %gateway_reference, "Payment not found for gateway reference");
            return Ok(ReconcileOutcome::PaymentNotFound);
        };

        if payment.status.is_resolved() {
            tracing::debug!(
                payment_id = %payment.id,
                status = %payment.status,
                "Ignoring callback for resolved payment"
            );
            return Ok(ReconcileOutcome::Duplicate(payment.status));
        }

        match update.status {
            CheckoutStatus::Pending => {
                tracing::debug!(payment_id = %payment.id, "Checkout not settled yet");
                return Ok(ReconcileOutcome::StillPending);
            }
            CheckoutStatus::Failed => {
                if !self.payment_repo.mark_failed(payment.id, payload).await? {
                    return self.duplicate(payment.id).await;
                }
                tracing::info!(payment_id = %payment.id, gateway_reference = %gateway_reference, "Payment failed");
                return Ok(ReconcileOutcome::Failed);
            }
            CheckoutStatus::Paid => {}
        }

        let mismatch = update.amount.filter(|captured| *captured != payment.amount).map(|captured| {
            format!("captured amount {} does not match expected {}", captured, payment.amount)
        });

        match payment.payment_type {
            PaymentType::YearlySubscription => {
                self.apply_subscription(&payment, payload, mismatch.as_deref()).await
            }
            PaymentType::Booking => self.apply_booking(&payment, payload, mismatch.as_deref()).await,
        }
    }

    async fn duplicate(&self, payment_id: Uuid) -> Result<ReconcileOutcome> {
        let status = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .map(|p| p.status)
            .unwrap_or(PaymentStatus::Pending);
        Ok(ReconcileOutcome::Duplicate(status))
    }

    async fn apply_subscription(
        &self,
        payment: &Payment,
        payload: &Value,
        mismatch: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let expires_at = {
            let _gate = self.state_machine.lock().await;
            let mut tx = self.pool.begin().await?;

            if !SqlitePaymentRepository::claim(&mut *tx, payment.id, PaymentStatus::Succeeded, payload)
                .await?
            {
                drop(tx);
                return self.duplicate(payment.id).await;
            }
            if let Some(reason) = mismatch {
                let (outcome, alerts) =
                    self.refund_required(&mut *tx, payment, None, None, payload, reason).await?;
                tx.commit().await?;
                drop(_gate);
                self.notifications.dispatch(alerts).await;
                return Ok(outcome);
            }
            let expires_at =
                SqliteAccountRepository::extend_subscription(&mut *tx, payment.payer_id, Utc::now())
                    .await?;
            tx.commit().await?;
            expires_at
        };

        tracing::info!(
            payment_id = %payment.id,
            payer_id = %payment.payer_id,
            expires_at = %expires_at,
            "Subscription extended"
        );

        self.notifications
            .dispatch(vec![Alert::new(
                payment.payer_id,
                "Subscription active",
                format!(
                    "Your payment of {} was received. Your subscription now runs until {}.",
                    payment.amount,
                    expires_at.date_naive()
                ),
                RelatedEntity::Payment(payment.id),
            )])
            .await;

        Ok(ReconcileOutcome::SubscriptionExtended { expires_at })
    }

    async fn apply_booking(
        &self,
        payment: &Payment,
        payload: &Value,
        mismatch: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        // Resolve the provider before taking the gate; it needs a pool
        // connection of its own.
        let provider_id = match payment.related_booking_id {
            Some(id) => match self.booking_repo.find_by_id(id).await? {
                Some(booking) => Some(self.state_machine.provider_of(&booking).await?),
                None => None,
            },
            None => None,
        };

        let gate = self.state_machine.lock().await;
        let mut tx = self.pool.begin().await?;

        if !SqlitePaymentRepository::claim(&mut *tx, payment.id, PaymentStatus::Succeeded, payload)
            .await?
        {
            drop(tx);
            drop(gate);
            return self.duplicate(payment.id).await;
        }

        let booking = match payment.related_booking_id {
            Some(id) => SqliteBookingRepository::fetch(&mut *tx, id).await?,
            None => None,
        };

        let (booking, provider_id) = match (booking, provider_id) {
            (Some(booking), Some(provider_id)) => (booking, provider_id),
            (booking, _) => {
                let outcome = self
                    .refund_required(&mut *tx, payment, booking, None, payload, "booking no longer exists")
                    .await?;
                tx.commit().await?;
                drop(gate);
                self.notifications.dispatch(outcome.1).await;
                return Ok(outcome.0);
            }
        };

        let mismatch = mismatch.map(str::to_string).or_else(|| {
            let due = booking.amount_due_now();
            (booking.status.is_pre_confirmation() && due != payment.amount).then(|| {
                format!("booking now requires {} but checkout was opened for {}", due, payment.amount)
            })
        });
        if let Some(reason) = mismatch {
            let outcome = self
                .refund_required(&mut *tx, payment, Some(booking), Some(provider_id), payload, &reason)
                .await?;
            tx.commit().await?;
            drop(gate);
            self.notifications.dispatch(outcome.1).await;
            return Ok(outcome.0);
        }

        match BookingStateMachine::apply(
            &mut *tx,
            booking.clone(),
            provider_id,
            Actor::PaymentHandler,
            BookingStatus::Confirmed,
        )
        .await
        {
            Ok(outcome) => {
                tx.commit().await?;
                drop(gate);

                tracing::info!(
                    payment_id = %payment.id,
                    booking_id = %booking.id,
                    gateway_reference = %payment.gateway_transaction_id,
                    "Booking confirmed by payment"
                );

                self.notifications.dispatch(outcome.alerts).await;
                Ok(ReconcileOutcome::Confirmed(outcome.booking))
            }
            Err(e) if e.is_rejection() => {
                let reason = e.to_string();
                let outcome = self
                    .refund_required(&mut *tx, payment, Some(booking), Some(provider_id), payload, &reason)
                    .await?;
                tx.commit().await?;
                drop(gate);
                self.notifications.dispatch(outcome.1).await;
                Ok(outcome.0)
            }
            Err(e) => Err(e),
        }
    }

    /// Records captured money that cannot be applied. Flags the payment,
    /// cancels a booking still waiting on it and tells the payer.
    async fn refund_required(
        &self,
        conn: &mut SqliteConnection,
        payment: &Payment,
        booking: Option<Booking>,
        provider_id: Option<Uuid>,
        payload: &Value,
        reason: &str,
    ) -> Result<(ReconcileOutcome, Vec<Alert>)> {
        SqlitePaymentRepository::write_status(conn, payment.id, PaymentStatus::RefundRequired).await?;

        let booking_id = booking.as_ref().map(|b| b.id);
        let mut alerts = Vec::new();

        if let (Some(booking), Some(provider_id)) = (booking, provider_id) {
            if booking.status.is_pre_confirmation() {
                let outcome = BookingStateMachine::apply(
                    conn,
                    booking,
                    provider_id,
                    Actor::PaymentHandler,
                    BookingStatus::Cancelled,
                )
                .await?;
                alerts.extend(outcome.alerts);
            }
        }

        tracing::error!(
            payment_id = %payment.id,
            booking_id = ?booking_id,
            gateway_reference = %payment.gateway_transaction_id,
            amount = %payment.amount,
            reason = %reason,
            payload = %payload,
            "Payment captured but could not be applied; refund required"
        );

        alerts.push(Alert::new(
            payment.payer_id,
            "Refund required",
            format!(
                "We received your payment of {} but could not apply it ({}). The amount will be refunded.",
                payment.amount, reason
            ),
            RelatedEntity::Payment(payment.id),
        ));

        Ok((ReconcileOutcome::RefundRequired { booking_id }, alerts))
    }
}

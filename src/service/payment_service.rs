use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::{
        Account, BookingStatus, InitiatePaymentRequest, InitiatedPayment, Payment, PaymentStatus,
        PaymentType,
    },
    error::{AppError, Result},
    payments::{self, BillingInfo, CheckoutGateway, CheckoutRequest, CheckoutStatus, CheckoutUpdate},
    repository::{BookingRepository, PaymentRepository},
    service::{PaymentReconciler, ReconcileOutcome},
};

const DEFAULT_PAYMENT_METHOD: &str = "GCash";

pub struct PaymentService {
    payment_repo: Arc<dyn PaymentRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    gateway: Option<Arc<dyn CheckoutGateway>>,
    reconciler: Arc<PaymentReconciler>,
    yearly_price: Decimal,
}

impl PaymentService {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        gateway: Option<Arc<dyn CheckoutGateway>>,
        reconciler: Arc<PaymentReconciler>,
        yearly_price: Decimal,
    ) -> Self {
        Self {
            payment_repo,
            booking_repo,
            gateway,
            reconciler,
            yearly_price,
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn CheckoutGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("Online payments are not configured".to_string()))
    }

    /// Opens a hosted checkout. The payment row is written only after the
    /// gateway accepted the request, so a gateway failure leaves nothing
    /// behind.
    pub async fn initiate(&self, payer: &Account, request: InitiatePaymentRequest) -> Result<InitiatedPayment> {
        let gateway = self.gateway()?;

        let payment_type = match (request.payment_type, request.booking_id) {
            (Some(kind), _) => kind,
            (None, Some(_)) => PaymentType::Booking,
            (None, None) => {
                return Err(AppError::BadRequest(
                    "Either booking_id or payment_type is required".to_string(),
                ))
            }
        };

        let (amount, description, related_booking_id) = match payment_type {
            PaymentType::YearlySubscription => (
                self.yearly_price,
                "Localynk yearly subscription".to_string(),
                None,
            ),
            PaymentType::Booking => {
                let booking_id = request.booking_id.ok_or_else(|| {
                    AppError::BadRequest("booking_id is required for booking payments".to_string())
                })?;
                let booking = self
                    .booking_repo
                    .find_by_id(booking_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

                if booking.tourist_id != payer.id {
                    return Err(AppError::Forbidden);
                }
                if !matches!(booking.status, BookingStatus::PendingPayment | BookingStatus::Accepted) {
                    return Err(AppError::Conflict(format!(
                        "A {} booking is not awaiting payment",
                        booking.status
                    )));
                }

                let amount = booking.amount_due_now();
                (
                    amount,
                    format!(
                        "Down payment for booking {} ({} to {})",
                        booking.id,
                        booking.stay.check_in(),
                        booking.stay.check_out()
                    ),
                    Some(booking.id),
                )
            }
        };

        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest("Nothing to pay for this booking".to_string()));
        }

        let payment_method = request
            .payment_method
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

        let session = gateway
            .create_checkout(CheckoutRequest {
                amount,
                description,
                billing: BillingInfo {
                    name: payer.full_name.clone(),
                    email: payer.email.clone(),
                    phone: payer.phone_number.clone(),
                },
                method_hint: Some(payment_method.clone()),
            })
            .await?;

        let payment = self
            .payment_repo
            .create(Payment {
                id: Uuid::new_v4(),
                payer_id: payer.id,
                payment_type,
                related_booking_id,
                amount,
                payment_method,
                gateway_transaction_id: session.reference.clone(),
                checkout_url: Some(session.checkout_url.clone()),
                status: PaymentStatus::Pending,
                gateway_response: Some(session.raw),
                timestamp: Utc::now(),
                resolved_at: None,
            })
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            payer_id = %payer.id,
            booking_id = ?related_booking_id,
            gateway_reference = %payment.gateway_transaction_id,
            amount = %amount,
            "Checkout created"
        );

        Ok(InitiatedPayment {
            payment_id: payment.id,
            transaction_id: payment.gateway_transaction_id,
            amount,
            checkout_url: session.checkout_url,
        })
    }

    /// Current state of a payment. A still-pending payment is checked with
    /// the gateway and reconciled if it has since settled.
    pub async fn status(&self, viewer: &Account, payment_id: Uuid) -> Result<Payment> {
        let payment = self.require(payment_id).await?;
        if payment.payer_id != viewer.id && !viewer.is_admin {
            return Err(AppError::Forbidden);
        }
        if payment.status.is_resolved() {
            return Ok(payment);
        }
        let Some(gateway) = self.gateway.as_ref() else {
            return Ok(payment);
        };

        let remote = match gateway.retrieve_checkout(&payment.gateway_transaction_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    payment_id = %payment.id,
                    gateway_reference = %payment.gateway_transaction_id,
                    "Could not poll gateway: {}",
                    e
                );
                return Ok(payment);
            }
        };

        if remote == CheckoutStatus::Pending {
            return Ok(payment);
        }

        let payload = serde_json::json!({
            "source": "poll",
            "reference_number": payment.gateway_transaction_id,
            "status": if remote == CheckoutStatus::Paid { "paid" } else { "failed" },
        });
        let update = CheckoutUpdate {
            reference: payment.gateway_transaction_id.clone(),
            status: remote,
            amount: None,
        };
        self.reconciler.reconcile(&update, &payload).await?;

        self.require(payment_id).await
    }

    pub async fn history(&self, payer: &Account) -> Result<Vec<Payment>> {
        self.payment_repo.list_for_payer(payer.id).await
    }

    /// Entry point for gateway push callbacks whose signature was verified.
    pub async fn handle_callback(&self, payload: &Value) -> Result<ReconcileOutcome> {
        let update = payments::normalize(payload)?;
        self.reconciler.reconcile(&update, payload).await
    }

    /// Entry point for push callbacks that carry no verifiable signature.
    ///
    /// The body is only a hint: a final status is taken from the gateway
    /// itself before anything is reconciled.
    pub async fn handle_unsigned_callback(&self, payload: &Value) -> Result<ReconcileOutcome> {
        let mut update = payments::normalize(payload)?;

        let pending = match self.payment_repo.find_by_gateway_reference(&update.reference).await? {
            Some(payment) => !payment.status.is_resolved(),
            None => false,
        };
        if pending && update.status.is_final() {
            let gateway = self.gateway()?;
            let remote = gateway.retrieve_checkout(&update.reference).await?;
            if remote != update.status {
                tracing::warn!(
                    gateway_reference = %update.reference,
                    claimed = ?update.status,
                    actual = ?remote,
                    "Unsigned callback disagrees with gateway"
                );
            }
            update.status = remote;
            update.amount = None;
        }

        self.reconciler.reconcile(&update, payload).await
    }

    async fn require(&self, payment_id: Uuid) -> Result<Payment> {
        self.payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }
}

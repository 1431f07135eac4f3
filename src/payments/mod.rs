use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::Result;

pub mod paymongo;
pub mod webhook;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use paymongo::PayMongoClient;
pub use webhook::{normalize, verify_signature, CheckoutUpdate};
#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeGateway;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BillingInfo {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub amount: Decimal,
    pub description: String,
    pub billing: BillingInfo,
    /// e.g. "GCash"; shown to the payer and echoed back in remarks.
    pub method_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub checkout_url: String,
    /// Opaque gateway reference used to match later callbacks.
    pub reference: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStatus {
    Pending,
    Paid,
    Failed,
}

impl CheckoutStatus {
    /// Maps a gateway status string. Pushed callbacks and status polls both
    /// go through here so they never disagree about a payment.
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "paid" | "succeeded" => CheckoutStatus::Paid,
            "unpaid" | "pending" | "processing" | "awaiting_payment_method" | "awaiting_next_action" => {
                CheckoutStatus::Pending
            }
            _ => CheckoutStatus::Failed,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, CheckoutStatus::Pending)
    }
}

/// Hosted-checkout payment provider.
///
/// Implementations map every transport or provider failure to
/// `AppError::Gateway`.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession>;
    async fn retrieve_checkout(&self, reference: &str) -> Result<CheckoutStatus>;
}

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub payment_type: PaymentType,
    pub related_booking_id: Option<Uuid>,
    pub amount: Decimal,
    pub payment_method: String,
    /// Reference assigned by the gateway; the reconciliation key.
    pub gateway_transaction_id: String,
    pub checkout_url: Option<String>,
    pub status: PaymentStatus,
    pub gateway_response: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    /// Money was captured but the booking could not be confirmed.
    RefundRequired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::RefundRequired => "refund_required",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "failed" => Some(PaymentStatus::Failed),
            "refund_required" => Some(PaymentStatus::RefundRequired),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentType {
    Booking,
    YearlySubscription,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Booking => "Booking",
            PaymentType::YearlySubscription => "YearlySubscription",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Booking" => Some(PaymentType::Booking),
            "YearlySubscription" => Some(PaymentType::YearlySubscription),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiatePaymentRequest {
    pub booking_id: Option<Uuid>,
    pub payment_type: Option<PaymentType>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatedPayment {
    pub payment_id: Uuid,
    pub transaction_id: String,
    pub amount: Decimal,
    pub checkout_url: String,
}

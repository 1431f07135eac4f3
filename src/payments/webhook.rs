//! Gateway callback parsing.
//!
//! Everything gateway specific about a callback stops here; reconciliation
//! only ever sees a [`CheckoutUpdate`].

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::CheckoutStatus;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutUpdate {
    pub reference: String,
    pub status: CheckoutStatus,
    /// Captured amount, when the gateway reports one.
    pub amount: Option<Decimal>,
}

/// Extracts reference, status and captured amount from a callback body.
///
/// Understands the payment-link event envelope
/// (`data.attributes.data.attributes.{reference_number,status,amount}`) and a
/// flat `{reference_number | transaction_id, status, amount}` body. Amounts
/// are integer centavos.
pub fn normalize(payload: &Value) -> Result<CheckoutUpdate> {
    let resource = payload
        .pointer("/data/attributes/data/attributes")
        .or_else(|| payload.pointer("/data/attributes"))
        .unwrap_or(payload);

    let reference = resource
        .get("reference_number")
        .or_else(|| resource.get("transaction_id"))
        .and_then(reference_text)
        .ok_or_else(|| AppError::BadRequest("Callback has no payment reference".to_string()))?;

    let status = resource
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Callback has no payment status".to_string()))?;

    let amount = match resource.get("amount") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_i64()
                .map(|centavos| Decimal::new(centavos, 2))
                .ok_or_else(|| AppError::BadRequest("Callback amount is not in centavos".to_string()))?,
        ),
    };

    Ok(CheckoutUpdate {
        reference,
        status: CheckoutStatus::from_gateway(status),
        amount,
    })
}

fn reference_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Checks a `Paymongo-Signature` header of the form `t=<ts>,te=<hex>,li=<hex>`.
///
/// The signature is `HMAC-SHA256("{t}.{body}", secret)`; either the test
/// (`te`) or live (`li`) slot may carry it.
pub fn verify_signature(header: &str, body: &[u8], secret: &str) -> bool {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("te", value)) | Some(("li", value)) if !value.is_empty() => candidates.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    candidates
        .iter()
        .any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn reads_link_event_envelope() {
        let payload = json!({
            "data": {
                "id": "evt_1",
                "attributes": {
                    "type": "link.payment.paid",
                    "data": {
                        "id": "link_1",
                        "attributes": {
                            "reference_number": "AbC123",
                            "status": "paid",
                            "amount": 39000
                        }
                    }
                }
            }
        });
        assert_eq!(
            normalize(&payload).unwrap(),
            CheckoutUpdate {
                reference: "AbC123".to_string(),
                status: CheckoutStatus::Paid,
                amount: Some(Decimal::new(39000, 2)),
            }
        );
    }

    #[test]
    fn reads_flat_body() {
        let payload = json!({ "transaction_id": "ref-9", "status": "failed" });
        assert_eq!(
            normalize(&payload).unwrap(),
            CheckoutUpdate {
                reference: "ref-9".to_string(),
                status: CheckoutStatus::Failed,
                amount: None,
            }
        );
    }

    #[test]
    fn unpaid_link_is_still_pending() {
        for status in ["unpaid", "pending", "processing"] {
            let update = normalize(&json!({ "reference_number": "r", "status": status })).unwrap();
            assert_eq!(update.status, CheckoutStatus::Pending, "{}", status);
            assert!(!update.status.is_final());
        }
        let update = normalize(&json!({ "reference_number": "r", "status": "expired" })).unwrap();
        assert_eq!(update.status, CheckoutStatus::Failed);
    }

    #[test]
    fn rejects_non_integer_amount() {
        let payload = json!({ "reference_number": "r", "status": "paid", "amount": "390.00" });
        assert!(normalize(&payload).is_err());
    }

    #[test]
    fn rejects_body_without_reference() {
        assert!(normalize(&json!({ "status": "paid" })).is_err());
    }

    #[test]
    fn accepts_live_or_test_signature() {
        let body = br#"{"data":{}}"#;
        let sig = sign("whsk_1", "1700000000", body);

        assert!(verify_signature(&format!("t=1700000000,te={},li=", sig), body, "whsk_1"));
        assert!(verify_signature(&format!("t=1700000000,te=,li={}", sig), body, "whsk_1"));
    }

    #[test]
    fn rejects_tampered_body_or_wrong_secret() {
        let body = br#"{"data":{}}"#;
        let sig = sign("whsk_1", "1700000000", body);
        let header = format!("t=1700000000,te={}", sig);

        assert!(!verify_signature(&header, br#"{"data":{"x":1}}"#, "whsk_1"));
        assert!(!verify_signature(&header, body, "whsk_2"));
        assert!(!verify_signature(&format!("te={}", sig), body, "whsk_1"));
    }
}

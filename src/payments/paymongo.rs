//! PayMongo payment-links client.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::PayMongoConfig,
    error::{AppError, Result},
    payments::{CheckoutGateway, CheckoutRequest, CheckoutSession, CheckoutStatus},
};

#[derive(Clone)]
pub struct PayMongoClient {
    client: Client,
    secret_key: String,
    base_url: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct LinkEnvelope {
    data: LinkData,
}

#[derive(Debug, Deserialize)]
struct LinkList {
    data: Vec<LinkData>,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    attributes: LinkAttributes,
}

#[derive(Debug, Deserialize)]
struct LinkAttributes {
    checkout_url: Option<String>,
    reference_number: Option<String>,
    status: Option<String>,
}

impl PayMongoClient {
    pub fn new(secret_key: String, base_url: String, currency: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            currency,
        }
    }

    /// Builds a client when payments are enabled and a secret key is set.
    pub fn from_config(config: &PayMongoConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        match &config.secret_key {
            Some(key) if !key.is_empty() => Some(Self::new(
                key.clone(),
                config.api_base_url.clone(),
                config.currency.clone(),
            )),
            _ => {
                tracing::warn!("PayMongo enabled but no secret key configured");
                None
            }
        }
    }

    fn to_centavos(amount: Decimal) -> Result<i64> {
        (amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or_else(|| AppError::BadRequest(format!("Amount out of range: {}", amount)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("PayMongo request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Gateway(format!("PayMongo response unreadable: {}", e)))?;

        tracing::debug!(status = %status, "PayMongo response");

        if status.is_success() {
            Ok(body)
        } else {
            tracing::error!(status = %status, body = %body, "PayMongo request rejected");
            Err(AppError::Gateway(format!("PayMongo returned {}", status)))
        }
    }
}

#[async_trait]
impl CheckoutGateway for PayMongoClient {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let amount = Self::to_centavos(request.amount)?;
        let payload = json!({
            "data": {
                "attributes": {
                    "amount": amount,
                    "description": request.description,
                    "currency": self.currency,
                    "remarks": request.method_hint.as_deref().unwrap_or("Localynk booking"),
                    "billing": request.billing,
                }
            }
        });

        let body = self
            .send(self.client.post(format!("{}/links", self.base_url)).json(&payload))
            .await?;

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| AppError::Gateway(format!("Invalid PayMongo response: {}", e)))?;
        let envelope: LinkEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::Gateway(format!("Invalid PayMongo response: {}", e)))?;

        let attributes = envelope.data.attributes;
        let checkout_url = attributes
            .checkout_url
            .ok_or_else(|| AppError::Gateway("PayMongo link has no checkout_url".to_string()))?;
        let reference = attributes
            .reference_number
            .ok_or_else(|| AppError::Gateway("PayMongo link has no reference_number".to_string()))?;

        tracing::info!(reference = %reference, amount, "PayMongo payment link created");

        Ok(CheckoutSession {
            checkout_url,
            reference,
            raw,
        })
    }

    async fn retrieve_checkout(&self, reference: &str) -> Result<CheckoutStatus> {
        let body = self
            .send(
                self.client
                    .get(format!("{}/links", self.base_url))
                    .query(&[("reference_number", reference)]),
            )
            .await?;

        let list: LinkList = serde_json::from_str(&body)
            .map_err(|e| AppError::Gateway(format!("Invalid PayMongo response: {}", e)))?;

        let status = list
            .data
            .into_iter()
            .next()
            .and_then(|link| link.attributes.status)
            .ok_or_else(|| AppError::Gateway(format!("PayMongo has no link {}", reference)))?;

        Ok(CheckoutStatus::from_gateway(&status))
    }
}

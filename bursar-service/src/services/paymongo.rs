//! PayMongo payment provider client.
//!
//! Implements the Links API for payment-link creation and HMAC signature
//! verification for webhook deliveries.

use anyhow::{anyhow, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::PayMongoConfig;

/// Maximum accepted skew between a webhook's signed timestamp and now.
const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

/// PayMongo client for interacting with the PayMongo API.
#[derive(Clone)]
pub struct PayMongoClient {
    client: Client,
    config: PayMongoConfig,
}

#[derive(Debug, Error)]
pub enum PayMongoError {
    #[error("PayMongo credentials not configured")]
    NotConfigured,

    #[error("PayMongo request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("PayMongo returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("Unexpected PayMongo response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Payment link minted by the gateway.
#[derive(Debug, Clone)]
pub struct PaymentLink {
    /// Provider-side link id; webhook events refer back to it.
    pub reference_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Serialize)]
struct CreateLinkRequest {
    data: CreateLinkData,
}

#[derive(Debug, Serialize)]
struct CreateLinkData {
    attributes: CreateLinkAttributes,
}

#[derive(Debug, Serialize)]
struct CreateLinkAttributes {
    /// Amount in centavos (minor currency units).
    amount: i64,
    description: String,
    reference_number: String,
}

#[derive(Debug, Deserialize)]
struct LinkEnvelope {
    data: LinkData,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    id: String,
    attributes: LinkAttributes,
}

#[derive(Debug, Deserialize)]
struct LinkAttributes {
    checkout_url: String,
}

/// Webhook event envelope delivered by the gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub id: String,
    #[serde(default)]
    pub attributes: WebhookAttributes,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookAttributes {
    pub link_id: Option<String>,
    pub payment_method: Option<String>,
}

impl WebhookEvent {
    /// Provider reference the event points at: the link id when the payload
    /// carries one, otherwise the event's own data id.
    pub fn provider_reference(&self) -> &str {
        self.data
            .attributes
            .link_id
            .as_deref()
            .unwrap_or(&self.data.id)
    }
}

impl PayMongoClient {
    /// Create a new PayMongo client with a bounded request timeout.
    pub fn new(config: PayMongoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    /// Check if PayMongo is configured (secret key is set).
    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    /// Create a payment link.
    ///
    /// # Arguments
    /// * `amount` - Amount in centavos (minor currency units)
    /// * `description` - Human-readable summary shown on the checkout page
    /// * `reference_number` - Caller-side reference echoed back by the gateway
    pub async fn create_link(
        &self,
        amount: i64,
        description: &str,
        reference_number: &str,
    ) -> Result<PaymentLink, PayMongoError> {
        if !self.is_configured() {
            return Err(PayMongoError::NotConfigured);
        }

        let request = CreateLinkRequest {
            data: CreateLinkData {
                attributes: CreateLinkAttributes {
                    amount,
                    description: description.to_string(),
                    reference_number: reference_number.to_string(),
                },
            },
        };

        let url = format!("{}/links", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.secret_key.expose_secret(), Some(""))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, body = %body, "PayMongo create_link response");

        if status.is_success() {
            let envelope: LinkEnvelope = serde_json::from_str(&body)?;
            tracing::info!(
                link_id = %envelope.data.id,
                amount,
                reference_number = %reference_number,
                "PayMongo payment link created"
            );
            Ok(PaymentLink {
                reference_id: envelope.data.id,
                checkout_url: envelope.data.attributes.checkout_url,
            })
        } else {
            let payload: Option<serde_json::Value> = serde_json::from_str(&body).ok();
            let message = payload
                .as_ref()
                .and_then(|value| value.get("errors"))
                .and_then(|errors| errors.get(0))
                .and_then(|error| error.get("detail"))
                .and_then(|detail| detail.as_str())
                .map(|detail| detail.to_string())
                .unwrap_or_else(|| format!("Payment link request rejected ({})", status));
            tracing::error!(
                status = %status,
                message = %message,
                "PayMongo link creation failed"
            );
            Err(PayMongoError::Api {
                status: status.as_u16(),
                message,
                body: payload,
            })
        }
    }

    /// Verify a webhook signature header.
    ///
    /// The header carries `t=<unix ts>,te=<hex>,li=<hex>`; the signature is
    /// `HMAC-SHA256("{t}.{body}", webhook_secret)`. The live signature wins
    /// when both are present. Timestamps outside the tolerance window fail.
    pub fn verify_webhook_signature(&self, body: &str, header: &str) -> Result<bool> {
        let Some((timestamp, signature)) = parse_signature_header(header) else {
            tracing::warn!("Malformed Paymongo-Signature header");
            return Ok(false);
        };

        let age = (Utc::now().timestamp() - timestamp).abs();
        if age > SIGNATURE_TOLERANCE_SECONDS {
            tracing::warn!(age_seconds = age, "Webhook signature timestamp out of tolerance");
            return Ok(false);
        }

        let Ok(candidate) = hex::decode(&signature) else {
            tracing::warn!("Webhook signature is not valid hex");
            return Ok(false);
        };

        let payload = format!("{}.{}", timestamp, body);
        let expected =
            compute_signature(&payload, self.config.webhook_secret.expose_secret())?;

        let is_valid: bool = expected.as_slice().ct_eq(candidate.as_slice()).into();
        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }

    /// Parse a webhook event from the request body.
    pub fn parse_webhook_event(&self, body: &str) -> Result<WebhookEvent> {
        let event: WebhookEvent = serde_json::from_str(body)?;
        Ok(event)
    }
}

/// Split the signature header into its timestamp and the preferred signature.
fn parse_signature_header(header: &str) -> Option<(i64, String)> {
    let mut timestamp = None;
    let mut test_signature = None;
    let mut live_signature = None;

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "te" => test_signature = Some(value.to_string()),
            "li" => live_signature = Some(value.to_string()),
            _ => {}
        }
    }

    let signature = live_signature.or(test_signature)?;
    Some((timestamp?, signature))
}

/// Compute the raw HMAC-SHA256 signature for a payload.
fn compute_signature(payload: &str, secret: &str) -> Result<Vec<u8>> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| anyhow!("Invalid key length"))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_config() -> PayMongoConfig {
        PayMongoConfig {
            secret_key: Secret::new("sk_test_123".to_string()),
            webhook_secret: Secret::new("whsec_test".to_string()),
            api_base_url: "https://api.paymongo.com/v1".to_string(),
            timeout_seconds: 5,
        }
    }

    fn sign(secret: &str, payload: &str) -> String {
        hex::encode(compute_signature(payload, secret).unwrap())
    }

    #[test]
    fn test_is_configured() {
        let client = PayMongoClient::new(test_config()).unwrap();
        assert!(client.is_configured());

        let empty_config = PayMongoConfig {
            secret_key: Secret::new("".to_string()),
            webhook_secret: Secret::new("".to_string()),
            api_base_url: "".to_string(),
            timeout_seconds: 5,
        };
        let client = PayMongoClient::new(empty_config).unwrap();
        assert!(!client.is_configured());
    }

    #[test]
    fn test_valid_signature_accepted() {
        let client = PayMongoClient::new(test_config()).unwrap();
        let body = r#"{"type":"payment.paid"}"#;
        let timestamp = Utc::now().timestamp();
        let signature = sign("whsec_test", &format!("{}.{}", timestamp, body));
        let header = format!("t={},te={}", timestamp, signature);

        assert!(client.verify_webhook_signature(body, &header).unwrap());
    }

    #[test]
    fn test_live_signature_takes_precedence() {
        let client = PayMongoClient::new(test_config()).unwrap();
        let body = r#"{"type":"payment.paid"}"#;
        let timestamp = Utc::now().timestamp();
        let valid = sign("whsec_test", &format!("{}.{}", timestamp, body));
        let bogus = sign("whsec_other", &format!("{}.{}", timestamp, body));

        let header = format!("t={},te={},li={}", timestamp, bogus, valid);
        assert!(client.verify_webhook_signature(body, &header).unwrap());

        let header = format!("t={},te={},li={}", timestamp, valid, bogus);
        assert!(!client.verify_webhook_signature(body, &header).unwrap());
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let client = PayMongoClient::new(test_config()).unwrap();
        let body = r#"{"type":"payment.paid"}"#;
        let timestamp = Utc::now().timestamp();
        let signature = sign("whsec_wrong", &format!("{}.{}", timestamp, body));
        let header = format!("t={},te={}", timestamp, signature);

        assert!(!client.verify_webhook_signature(body, &header).unwrap());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let client = PayMongoClient::new(test_config()).unwrap();
        let body = r#"{"type":"payment.paid"}"#;
        let timestamp = Utc::now().timestamp() - 4000;
        let signature = sign("whsec_test", &format!("{}.{}", timestamp, body));
        let header = format!("t={},te={}", timestamp, signature);

        assert!(!client.verify_webhook_signature(body, &header).unwrap());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let client = PayMongoClient::new(test_config()).unwrap();
        let body = "{}";

        assert!(!client.verify_webhook_signature(body, "garbage").unwrap());
        assert!(!client.verify_webhook_signature(body, "t=not-a-number,te=ab").unwrap());
        assert!(!client.verify_webhook_signature(body, "t=123").unwrap());
        assert!(!client.verify_webhook_signature(body, "").unwrap());
    }

    #[test]
    fn test_provider_reference_prefers_link_id() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"type":"payment.paid","data":{"id":"evt_1","attributes":{"link_id":"link_abc"}}}"#,
        )
        .unwrap();
        assert_eq!(event.provider_reference(), "link_abc");
    }

    #[test]
    fn test_provider_reference_falls_back_to_data_id() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"type":"link.payment.expired","data":{"id":"link_xyz"}}"#,
        )
        .unwrap();
        assert_eq!(event.provider_reference(), "link_xyz");
    }

    #[test]
    fn test_parse_webhook_event() {
        let client = PayMongoClient::new(test_config()).unwrap();
        let event = client
            .parse_webhook_event(
                r#"{"type":"payment.paid","data":{"id":"evt_1","attributes":{"link_id":"link_abc","payment_method":"gcash"}}}"#,
            )
            .unwrap();
        assert_eq!(event.event_type, "payment.paid");
        assert_eq!(event.data.attributes.payment_method.as_deref(), Some("gcash"));

        assert!(client.parse_webhook_event("not json").is_err());
    }
}

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use crate::services::AppError;
use crate::AppState;

/// Acknowledgement returned for every verified delivery. Processing
/// problems ride along in `error` so the provider never retry-storms us
/// over a local fault it cannot fix.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookAck {
    fn ok() -> Self {
        Self {
            received: true,
            error: None,
        }
    }

    fn with_error(error: impl Into<String>) -> Self {
        Self {
            received: true,
            error: Some(error.into()),
        }
    }
}

pub async fn paymongo_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get("Paymongo-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Missing Paymongo-Signature header"))
        })?;

    let valid = state.paymongo.verify_webhook_signature(&body, signature)?;
    if !valid {
        metrics::counter!("paymongo_webhook_rejected_total").increment(1);
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    // The signature checks out, so everything from here on is acknowledged
    // with a 200; failures are reported in the ack body only.
    let event = match state.paymongo.parse_webhook_event(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Discarding unparseable webhook payload");
            return Ok(Json(WebhookAck::with_error("Unrecognized event payload")));
        }
    };

    metrics::counter!("paymongo_webhook_events_total", "event_type" => event.event_type.clone())
        .increment(1);

    match state.reconciler.apply_event(&event).await {
        Ok(outcome) => {
            tracing::debug!(outcome = ?outcome, "Webhook processed");
            Ok(Json(WebhookAck::ok()))
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                event_type = %event.event_type,
                "Webhook processing failed"
            );
            Ok(Json(WebhookAck::with_error(e.to_string())))
        }
    }
}

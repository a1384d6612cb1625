use std::sync::Arc;

use mongodb::bson::DateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{InvoiceStatus, LineItem, PaymentStatus};
use crate::services::error::AppError;
use crate::services::paymongo::{PayMongoClient, WebhookEvent};
use crate::services::repository::{PaymentResolution, RecordStore};

/// PayMongo expects amounts in centavos.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Joins line items into the human-readable description shown on the
/// hosted checkout page, e.g. "Tuition (1x), Library fee (2x)".
pub fn describe_items(items: &[LineItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} ({}x)", item.description, item.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of applying a single webhook event.
#[derive(Debug, PartialEq)]
pub enum EventOutcome {
    /// The event moved an invoice into the given status.
    Applied {
        invoice_id: Uuid,
        status: InvoiceStatus,
    },
    /// No invoice carries the referenced payment link.
    NoMatch { reference: String },
    /// An event type the reconciler does not act on.
    Ignored { event_type: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkDetails {
    pub invoice_id: Uuid,
    pub status: InvoiceStatus,
    pub checkout_url: String,
    pub provider_reference_id: String,
}

/// Drives payment-link creation and folds provider webhook events back
/// into invoice and payment state.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    gateway: PayMongoClient,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, gateway: PayMongoClient) -> Self {
        Self { store, gateway }
    }

    /// Request a hosted payment link for an invoice. The invoice moves to
    /// `sent` only after the provider accepts the request; any gateway
    /// failure leaves it untouched.
    pub async fn create_payment_link(
        &self,
        invoice_id: Uuid,
    ) -> Result<PaymentLinkDetails, AppError> {
        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        if invoice.items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice has no line items"
            )));
        }

        let amount = to_minor_units(invoice.total_amount);
        if amount <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice total must be greater than zero"
            )));
        }

        let description = describe_items(&invoice.items);
        let reference = invoice
            .invoice_number
            .clone()
            .unwrap_or_else(|| invoice.id.to_string());

        let link = self
            .gateway
            .create_link(amount, &description, &reference)
            .await?;

        let updated = self
            .store
            .mark_invoice_sent(invoice.id, &link.reference_id, &link.checkout_url)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        tracing::info!(
            invoice_id = %updated.id,
            reference = %link.reference_id,
            "Payment link created"
        );

        Ok(PaymentLinkDetails {
            invoice_id: updated.id,
            status: updated.status,
            checkout_url: link.checkout_url,
            provider_reference_id: link.reference_id,
        })
    }

    /// Apply one verified webhook event. Transitions are keyed by the
    /// provider link reference; paid and failed events also resolve the
    /// payment record attached to the invoice, when there is one.
    pub async fn apply_event(&self, event: &WebhookEvent) -> Result<EventOutcome, AppError> {
        let reference = event.provider_reference();

        let (status, resolution) = match event.event_type.as_str() {
            "payment.paid" => (
                InvoiceStatus::Paid,
                Some(PaymentResolution {
                    status: PaymentStatus::Completed,
                    payment_method: Some(
                        event
                            .data
                            .attributes
                            .payment_method
                            .clone()
                            .unwrap_or_else(|| "online".to_string()),
                    ),
                    payment_date: Some(DateTime::now()),
                    transaction_id: Some(event.data.id.clone()),
                }),
            ),
            "payment.failed" => (
                InvoiceStatus::PaymentFailed,
                Some(PaymentResolution {
                    status: PaymentStatus::Failed,
                    payment_method: None,
                    payment_date: None,
                    transaction_id: None,
                }),
            ),
            "link.payment.checkout_url_visited" => (InvoiceStatus::Processing, None),
            "link.payment.expired" => (InvoiceStatus::Expired, None),
            other => {
                tracing::debug!(event_type = %other, "Ignoring unhandled webhook event");
                return Ok(EventOutcome::Ignored {
                    event_type: other.to_string(),
                });
            }
        };

        let Some(invoice) = self
            .store
            .transition_invoice_by_provider_reference(reference, status)
            .await?
        else {
            tracing::warn!(
                reference = %reference,
                event_type = %event.event_type,
                "Webhook references an unknown payment link"
            );
            return Ok(EventOutcome::NoMatch {
                reference: reference.to_string(),
            });
        };

        if let Some(resolution) = resolution {
            if let Some(payment_id) = invoice.payment_id {
                let resolved = self.store.resolve_payment(payment_id, resolution).await?;
                if resolved.is_none() {
                    tracing::warn!(
                        payment_id = %payment_id,
                        invoice_id = %invoice.id,
                        "Invoice references a missing payment"
                    );
                }
            }
        }

        tracing::info!(
            invoice_id = %invoice.id,
            status = status.as_str(),
            event_type = %event.event_type,
            "Webhook event applied"
        );

        Ok(EventOutcome::Applied {
            invoice_id: invoice.id,
            status,
        })
    }
}

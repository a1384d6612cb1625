use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invoice issued to a user, optionally linked to a payment record.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    // Absent when unset so the sparse unique index skips unnumbered invoices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub payment_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub total_amount: f64,
    pub status: InvoiceStatus,
    pub due_date: Option<DateTime>,
    /// Payment-link id assigned by the gateway when the invoice is sent.
    pub provider_reference_id: Option<String>,
    pub checkout_url: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Single billable line on an invoice.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LineItem {
    pub description: String,
    /// Unit price in whole currency units.
    pub amount: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Invoice total as the sum of quantity times unit price over all items.
pub fn compute_total(items: &[LineItem]) -> f64 {
    items
        .iter()
        .map(|item| item.amount * f64::from(item.quantity))
        .sum()
}

/// Invoice lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
    PaymentFailed,
    Processing,
    Expired,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::PaymentFailed => "payment_failed",
            InvoiceStatus::Processing => "processing",
            InvoiceStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            "payment_failed" => Some(InvoiceStatus::PaymentFailed),
            "processing" => Some(InvoiceStatus::Processing),
            "expired" => Some(InvoiceStatus::Expired),
            _ => None,
        }
    }

    /// Statuses written exclusively by payment reconciliation. Rejected on the
    /// administrative status endpoint so webhook processing stays the single
    /// writer for them.
    pub fn is_provider_managed(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Paid
                | InvoiceStatus::PaymentFailed
                | InvoiceStatus::Processing
                | InvoiceStatus::Expired
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub invoice_number: Option<String>,
    pub payment_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub total_amount: f64,
    pub status: InvoiceStatus,
    pub due_date: Option<String>,
    pub provider_reference_id: Option<String>,
    pub checkout_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            user_id: invoice.user_id,
            invoice_number: invoice.invoice_number,
            payment_id: invoice.payment_id,
            items: invoice.items,
            total_amount: invoice.total_amount,
            status: invoice.status,
            due_date: invoice.due_date.map(|d| d.to_string()),
            provider_reference_id: invoice.provider_reference_id,
            checkout_url: invoice.checkout_url,
            created_at: invoice.created_at.to_string(),
            updated_at: invoice.updated_at.to_string(),
        }
    }
}

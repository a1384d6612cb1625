use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment record. Created independently of invoices; an invoice that carries
/// a `payment_id` gets this record mirrored when gateway events arrive.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub status: PaymentStatus,
    /// Gateway-side id of the settling event, recorded on completion.
    pub transaction_id: Option<String>,
    pub payment_date: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            amount: p.amount,
            description: p.description,
            payment_method: p.payment_method,
            status: p.status,
            transaction_id: p.transaction_id,
            payment_date: p.payment_date.map(|d| d.to_string()),
            created_at: p.created_at.to_string(),
            updated_at: p.updated_at.to_string(),
        }
    }
}

use async_trait::async_trait;
use mongodb::bson::DateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Invoice, InvoiceStatus, Payment, PaymentStatus, Student, User};
use crate::services::error::AppError;

/// Per-status aggregate over a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub status: String,
    pub count: i64,
    pub total_amount: f64,
}

/// Fields written onto a payment when reconciliation settles it.
#[derive(Debug, Clone)]
pub struct PaymentResolution {
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub payment_date: Option<DateTime>,
    pub transaction_id: Option<String>,
}

/// Persistence boundary for all dashboard records.
///
/// Injected as a trait object at startup so handlers and the reconciliation
/// engine never reach for a concrete database handle.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // Users
    async fn insert_user(&self, user: User) -> Result<(), AppError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
    async fn update_user(&self, user: &User) -> Result<Option<User>, AppError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError>;

    // Students
    async fn insert_student(&self, student: Student) -> Result<(), AppError>;
    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, AppError>;
    async fn list_students(&self) -> Result<Vec<Student>, AppError>;
    async fn update_student(&self, student: &Student) -> Result<Option<Student>, AppError>;
    async fn delete_student(&self, id: Uuid) -> Result<bool, AppError>;

    // Invoices
    async fn insert_invoice(&self, invoice: Invoice) -> Result<(), AppError>;
    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError>;
    async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError>;
    async fn list_invoices_for_user(&self, user_id: Uuid) -> Result<Vec<Invoice>, AppError>;
    async fn list_invoices_created_between(
        &self,
        start: DateTime,
        end: DateTime,
    ) -> Result<Vec<Invoice>, AppError>;
    async fn set_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError>;
    /// Record a successful link creation: status becomes `sent` and the
    /// provider reference and checkout URL are persisted in one write.
    async fn mark_invoice_sent(
        &self,
        id: Uuid,
        provider_reference_id: &str,
        checkout_url: &str,
    ) -> Result<Option<Invoice>, AppError>;
    /// Atomically move the invoice carrying this provider reference to the
    /// given status, returning the updated invoice when one matched.
    async fn transition_invoice_by_provider_reference(
        &self,
        reference: &str,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError>;
    async fn invoice_status_summary(&self) -> Result<Vec<StatusSummary>, AppError>;
    async fn delete_invoice(&self, id: Uuid) -> Result<bool, AppError>;

    // Payments
    async fn insert_payment(&self, payment: Payment) -> Result<(), AppError>;
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn list_payments(&self) -> Result<Vec<Payment>, AppError>;
    async fn list_payments_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, AppError>;
    async fn set_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, AppError>;
    /// Mirror a reconciliation outcome onto the payment in one write.
    async fn resolve_payment(
        &self,
        id: Uuid,
        resolution: PaymentResolution,
    ) -> Result<Option<Payment>, AppError>;
    async fn completed_payments_since(&self, start: DateTime) -> Result<Vec<Payment>, AppError>;
    async fn payment_status_summary(&self) -> Result<Vec<StatusSummary>, AppError>;
    async fn delete_payment(&self, id: Uuid) -> Result<bool, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

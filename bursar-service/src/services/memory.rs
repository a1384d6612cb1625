use async_trait::async_trait;
use dashmap::DashMap;
use mongodb::bson::DateTime;
use uuid::Uuid;

use crate::models::{Invoice, InvoiceStatus, Payment, PaymentStatus, Student, User};
use crate::services::error::AppError;
use crate::services::repository::{PaymentResolution, RecordStore, StatusSummary};

/// In-memory record store used by tests and local development without
/// a running MongoDB. Mirrors the uniqueness and update semantics of
/// [`MongoStore`](crate::services::mongo::MongoStore).
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    students: DashMap<Uuid, Student>,
    invoices: DashMap<Uuid, Invoice>,
    payments: DashMap<Uuid, Payment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_taken(&self, email: &str, exclude: Uuid) -> bool {
        self.users
            .iter()
            .any(|entry| entry.email == email && entry.id != exclude)
    }

    fn student_email_taken(&self, email: &str, exclude: Uuid) -> bool {
        self.students
            .iter()
            .any(|entry| entry.email == email && entry.id != exclude)
    }

    fn invoice_number_taken(&self, number: &str, exclude: Uuid) -> bool {
        self.invoices.iter().any(|entry| {
            entry.invoice_number.as_deref() == Some(number) && entry.id != exclude
        })
    }
}

fn summarize<I>(rows: I) -> Vec<StatusSummary>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut grouped: std::collections::BTreeMap<String, (i64, f64)> =
        std::collections::BTreeMap::new();
    for (status, amount) in rows {
        let entry = grouped.entry(status).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += amount;
    }
    grouped
        .into_iter()
        .map(|(status, (count, total_amount))| StatusSummary {
            status,
            count,
            total_amount,
        })
        .collect()
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<(), AppError> {
        if self.email_taken(&user.email, user.id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A user with this email already exists"
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|entry| entry.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.email == email)
            .map(|entry| entry.clone()))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.clone()).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<Option<User>, AppError> {
        if !self.users.contains_key(&user.id) {
            return Ok(None);
        }
        if self.email_taken(&user.email, user.id) {
            return Err(AppError::Conflict(anyhow::anyhow!("Email already in use")));
        }
        self.users.insert(user.id, user.clone());
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.users.remove(&id).is_some())
    }

    async fn insert_student(&self, student: Student) -> Result<(), AppError> {
        if self.student_email_taken(&student.email, student.id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A student with this email already exists"
            )));
        }
        self.students.insert(student.id, student);
        Ok(())
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, AppError> {
        Ok(self.students.get(&id).map(|entry| entry.clone()))
    }

    async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        let mut students: Vec<Student> =
            self.students.iter().map(|entry| entry.clone()).collect();
        students.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(students)
    }

    async fn update_student(&self, student: &Student) -> Result<Option<Student>, AppError> {
        if !self.students.contains_key(&student.id) {
            return Ok(None);
        }
        if self.student_email_taken(&student.email, student.id) {
            return Err(AppError::Conflict(anyhow::anyhow!("Email already in use")));
        }
        self.students.insert(student.id, student.clone());
        Ok(Some(student.clone()))
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.students.remove(&id).is_some())
    }

    async fn insert_invoice(&self, invoice: Invoice) -> Result<(), AppError> {
        if let Some(number) = &invoice.invoice_number {
            if self.invoice_number_taken(number, invoice.id) {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "An invoice with this number already exists"
                )));
            }
        }
        self.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.invoices.get(&id).map(|entry| entry.clone()))
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> =
            self.invoices.iter().map(|entry| entry.clone()).collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    async fn list_invoices_for_user(&self, user_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    async fn list_invoices_created_between(
        &self,
        start: DateTime,
        end: DateTime,
    ) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|entry| entry.created_at >= start && entry.created_at <= end)
            .map(|entry| entry.clone())
            .collect();
        invoices.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(invoices)
    }

    async fn set_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let Some(mut entry) = self.invoices.get_mut(&id) else {
            return Ok(None);
        };
        entry.status = status;
        entry.updated_at = DateTime::now();
        Ok(Some(entry.clone()))
    }

    async fn mark_invoice_sent(
        &self,
        id: Uuid,
        provider_reference_id: &str,
        checkout_url: &str,
    ) -> Result<Option<Invoice>, AppError> {
        let Some(mut entry) = self.invoices.get_mut(&id) else {
            return Ok(None);
        };
        entry.status = InvoiceStatus::Sent;
        entry.provider_reference_id = Some(provider_reference_id.to_string());
        entry.checkout_url = Some(checkout_url.to_string());
        entry.updated_at = DateTime::now();
        Ok(Some(entry.clone()))
    }

    async fn transition_invoice_by_provider_reference(
        &self,
        reference: &str,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let id = self
            .invoices
            .iter()
            .find(|entry| entry.provider_reference_id.as_deref() == Some(reference))
            .map(|entry| entry.id);
        let Some(id) = id else {
            return Ok(None);
        };
        self.set_invoice_status(id, status).await
    }

    async fn invoice_status_summary(&self) -> Result<Vec<StatusSummary>, AppError> {
        let rows: Vec<(String, f64)> = self
            .invoices
            .iter()
            .map(|entry| (entry.status.as_str().to_string(), entry.total_amount))
            .collect();
        Ok(summarize(rows))
    }

    async fn delete_invoice(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.invoices.remove(&id).is_some())
    }

    async fn insert_payment(&self, payment: Payment) -> Result<(), AppError> {
        self.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.payments.get(&id).map(|entry| entry.clone()))
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> =
            self.payments.iter().map(|entry| entry.clone()).collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn list_payments_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn set_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, AppError> {
        let Some(mut entry) = self.payments.get_mut(&id) else {
            return Ok(None);
        };
        entry.status = status;
        entry.updated_at = DateTime::now();
        Ok(Some(entry.clone()))
    }

    async fn resolve_payment(
        &self,
        id: Uuid,
        resolution: PaymentResolution,
    ) -> Result<Option<Payment>, AppError> {
        let Some(mut entry) = self.payments.get_mut(&id) else {
            return Ok(None);
        };
        entry.status = resolution.status;
        if let Some(method) = resolution.payment_method {
            entry.payment_method = Some(method);
        }
        if let Some(date) = resolution.payment_date {
            entry.payment_date = Some(date);
        }
        if let Some(transaction_id) = resolution.transaction_id {
            entry.transaction_id = Some(transaction_id);
        }
        entry.updated_at = DateTime::now();
        Ok(Some(entry.clone()))
    }

    async fn completed_payments_since(&self, start: DateTime) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|entry| {
                entry.status == PaymentStatus::Completed
                    && entry.payment_date.map_or(false, |date| date >= start)
            })
            .map(|entry| entry.clone())
            .collect();
        payments.sort_by(|a, b| a.payment_date.cmp(&b.payment_date));
        Ok(payments)
    }

    async fn payment_status_summary(&self) -> Result<Vec<StatusSummary>, AppError> {
        let rows: Vec<(String, f64)> = self
            .payments
            .iter()
            .map(|entry| (entry.status.as_str().to_string(), entry.amount))
            .collect();
        Ok(summarize(rows))
    }

    async fn delete_payment(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.payments.remove(&id).is_some())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

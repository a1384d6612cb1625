use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, DateTime, Document};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
};
use mongodb::{Client as MongoClient, Collection, IndexModel};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{Invoice, InvoiceStatus, Payment, PaymentStatus, Student, User};
use crate::services::error::AppError;
use crate::services::repository::{PaymentResolution, RecordStore, StatusSummary};

/// MongoDB-backed record store.
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    users: Collection<User>,
    students: Collection<Student>,
    invoices: Collection<Invoice>,
    payments: Collection<Payment>,
}

impl MongoStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let mut client_options = ClientOptions::parse(config.url.expose_secret())
            .await
            .map_err(|e| {
                tracing::error!("Failed to parse MongoDB connection string: {}", e);
                AppError::from(e)
            })?;
        client_options.app_name = Some("bursar-service".to_string());

        let client = MongoClient::with_options(client_options)?;
        let db = client.database(&config.db_name);
        tracing::info!(database = %config.db_name, "Connected to MongoDB");

        Ok(Self {
            client,
            users: db.collection("users"),
            students: db.collection("students"),
            invoices: db.collection("invoices"),
            payments: db.collection("payments"),
        })
    }

    /// Create the indexes the uniqueness rules and reconciliation lookups
    /// depend on. Idempotent across restarts.
    pub async fn init_indexes(&self) -> Result<(), AppError> {
        let user_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_email_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.users.create_index(user_email, None).await?;

        let student_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("student_email_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.students.create_index(student_email, None).await?;

        // Sparse so unnumbered invoices do not collide on the unique key.
        let invoice_number = IndexModel::builder()
            .keys(doc! { "invoice_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_number_unique".to_string())
                    .unique(true)
                    .sparse(true)
                    .build(),
            )
            .build();
        let invoice_reference = IndexModel::builder()
            .keys(doc! { "provider_reference_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_provider_reference_idx".to_string())
                    .build(),
            )
            .build();
        let invoice_user = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_user_idx".to_string())
                    .build(),
            )
            .build();
        self.invoices
            .create_indexes([invoice_number, invoice_reference, invoice_user], None)
            .await?;

        let payment_user = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("payment_user_idx".to_string())
                    .build(),
            )
            .build();
        let payment_status_date = IndexModel::builder()
            .keys(doc! { "status": 1, "payment_date": 1 })
            .options(
                IndexOptions::builder()
                    .name("payment_status_date_idx".to_string())
                    .build(),
            )
            .build();
        self.payments
            .create_indexes([payment_user, payment_status_date], None)
            .await?;

        tracing::info!("Bursar service indexes initialized");
        Ok(())
    }
}

fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(write_error))
            if write_error.code == 11000
    )
}

fn conflict_or_db(err: mongodb::error::Error, message: &'static str) -> AppError {
    if is_duplicate_key_error(&err) {
        AppError::Conflict(anyhow::anyhow!(message))
    } else {
        AppError::from(err)
    }
}

fn summary_count(row: &Document) -> i64 {
    row.get_i64("count")
        .or_else(|_| row.get_i32("count").map(i64::from))
        .unwrap_or(0)
}

/// Group a collection by status, summing the given amount field.
async fn status_summary<T>(
    collection: &Collection<T>,
    amount_field: &str,
) -> Result<Vec<StatusSummary>, AppError> {
    let pipeline = vec![doc! {
        "$group": {
            "_id": "$status",
            "count": { "$sum": 1 },
            "total_amount": { "$sum": format!("${}", amount_field) }
        }
    }];

    let mut cursor = collection.aggregate(pipeline, None).await?;
    let mut rows = Vec::new();
    while let Some(row) = cursor.try_next().await? {
        rows.push(StatusSummary {
            status: row.get_str("_id").unwrap_or_default().to_string(),
            count: summary_count(&row),
            total_amount: row.get_f64("total_amount").unwrap_or(0.0),
        });
    }
    rows.sort_by(|a, b| a.status.cmp(&b.status));
    Ok(rows)
}

#[async_trait]
impl RecordStore for MongoStore {
    async fn insert_user(&self, user: User) -> Result<(), AppError> {
        self.users
            .insert_one(user, None)
            .await
            .map_err(|e| conflict_or_db(e, "A user with this email already exists"))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.find_one(doc! { "email": email }, None).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.users.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_user(&self, user: &User) -> Result<Option<User>, AppError> {
        let result = self
            .users
            .replace_one(doc! { "_id": user.id.to_string() }, user, None)
            .await
            .map_err(|e| conflict_or_db(e, "Email already in use"))?;
        if result.matched_count == 0 {
            Ok(None)
        } else {
            Ok(Some(user.clone()))
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let result = self
            .users
            .delete_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_student(&self, student: Student) -> Result<(), AppError> {
        self.students
            .insert_one(student, None)
            .await
            .map_err(|e| conflict_or_db(e, "A student with this email already exists"))?;
        Ok(())
    }

    async fn get_student(&self, id: Uuid) -> Result<Option<Student>, AppError> {
        Ok(self
            .students
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.students.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_student(&self, student: &Student) -> Result<Option<Student>, AppError> {
        let result = self
            .students
            .replace_one(doc! { "_id": student.id.to_string() }, student, None)
            .await
            .map_err(|e| conflict_or_db(e, "Email already in use"))?;
        if result.matched_count == 0 {
            Ok(None)
        } else {
            Ok(Some(student.clone()))
        }
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, AppError> {
        let result = self
            .students
            .delete_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_invoice(&self, invoice: Invoice) -> Result<(), AppError> {
        self.invoices
            .insert_one(invoice, None)
            .await
            .map_err(|e| conflict_or_db(e, "An invoice with this number already exists"))?;
        Ok(())
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .invoices
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.invoices.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_invoices_for_user(&self, user_id: Uuid) -> Result<Vec<Invoice>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .invoices
            .find(doc! { "user_id": user_id.to_string() }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_invoices_created_between(
        &self,
        start: DateTime,
        end: DateTime,
    ) -> Result<Vec<Invoice>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self
            .invoices
            .find(doc! { "created_at": { "$gte": start, "$lte": end } }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .invoices
            .find_one_and_update(
                doc! { "_id": id.to_string() },
                doc! { "$set": { "status": to_bson(&status)?, "updated_at": DateTime::now() } },
                options,
            )
            .await?;
        Ok(updated)
    }

    async fn mark_invoice_sent(
        &self,
        id: Uuid,
        provider_reference_id: &str,
        checkout_url: &str,
    ) -> Result<Option<Invoice>, AppError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .invoices
            .find_one_and_update(
                doc! { "_id": id.to_string() },
                doc! { "$set": {
                    "status": to_bson(&InvoiceStatus::Sent)?,
                    "provider_reference_id": provider_reference_id,
                    "checkout_url": checkout_url,
                    "updated_at": DateTime::now()
                } },
                options,
            )
            .await?;
        Ok(updated)
    }

    async fn transition_invoice_by_provider_reference(
        &self,
        reference: &str,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .invoices
            .find_one_and_update(
                doc! { "provider_reference_id": reference },
                doc! { "$set": { "status": to_bson(&status)?, "updated_at": DateTime::now() } },
                options,
            )
            .await?;
        Ok(updated)
    }

    async fn invoice_status_summary(&self) -> Result<Vec<StatusSummary>, AppError> {
        status_summary(&self.invoices, "total_amount").await
    }

    async fn delete_invoice(&self, id: Uuid) -> Result<bool, AppError> {
        let result = self
            .invoices
            .delete_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_payment(&self, payment: Payment) -> Result<(), AppError> {
        self.payments.insert_one(payment, None).await?;
        Ok(())
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self
            .payments
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?)
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.payments.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_payments_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .payments
            .find(doc! { "user_id": user_id.to_string() }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, AppError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .payments
            .find_one_and_update(
                doc! { "_id": id.to_string() },
                doc! { "$set": { "status": to_bson(&status)?, "updated_at": DateTime::now() } },
                options,
            )
            .await?;
        Ok(updated)
    }

    async fn resolve_payment(
        &self,
        id: Uuid,
        resolution: PaymentResolution,
    ) -> Result<Option<Payment>, AppError> {
        let mut set_doc = doc! {
            "status": to_bson(&resolution.status)?,
            "updated_at": DateTime::now(),
        };
        if let Some(method) = resolution.payment_method {
            set_doc.insert("payment_method", method);
        }
        if let Some(date) = resolution.payment_date {
            set_doc.insert("payment_date", date);
        }
        if let Some(transaction_id) = resolution.transaction_id {
            set_doc.insert("transaction_id", transaction_id);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .payments
            .find_one_and_update(doc! { "_id": id.to_string() }, doc! { "$set": set_doc }, options)
            .await?;
        Ok(updated)
    }

    async fn completed_payments_since(&self, start: DateTime) -> Result<Vec<Payment>, AppError> {
        let filter = doc! {
            "status": to_bson(&PaymentStatus::Completed)?,
            "payment_date": { "$gte": start }
        };
        let options = FindOptions::builder().sort(doc! { "payment_date": 1 }).build();
        let cursor = self.payments.find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn payment_status_summary(&self) -> Result<Vec<StatusSummary>, AppError> {
        status_summary(&self.payments, "amount").await
    }

    async fn delete_payment(&self, id: Uuid) -> Result<bool, AppError> {
        let result = self
            .payments
            .delete_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}

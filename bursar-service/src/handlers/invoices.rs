use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::DateTime;
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{compute_total, Invoice, InvoiceResponse, InvoiceStatus, LineItem};
use crate::services::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub user_id: Uuid,
    pub invoice_number: Option<String>,
    pub payment_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceStatusRequest {
    pub status: String,
}

fn validate_items(items: &[LineItem]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invoice must have at least one line item"
        )));
    }
    for item in items {
        if item.description.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item description is required"
            )));
        }
        if item.amount < 0.0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item amount must not be negative"
            )));
        }
        if item.quantity == 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item quantity must be at least 1"
            )));
        }
    }
    Ok(())
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    validate_items(&payload.items)?;

    state
        .store
        .get_user(payload.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    if let Some(payment_id) = payload.payment_id {
        state
            .store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;
    }

    let now = DateTime::now();
    let invoice = Invoice {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        invoice_number: payload.invoice_number,
        payment_id: payload.payment_id,
        // The stored total is always derived from the items, never trusted
        // from the client.
        total_amount: compute_total(&payload.items),
        items: payload.items,
        status: InvoiceStatus::Draft,
        due_date: payload.due_date.map(DateTime::from_chrono),
        provider_reference_id: None,
        checkout_url: None,
        created_at: now,
        updated_at: now,
    };

    state.store.insert_invoice(invoice.clone()).await?;

    tracing::info!(
        invoice_id = %invoice.id,
        user_id = %invoice.user_id,
        total_amount = invoice.total_amount,
        "Invoice created"
    );

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(invoice))))
}

pub async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let invoices = state.store.list_invoices().await?;
    Ok(Json(
        invoices.into_iter().map(InvoiceResponse::from).collect(),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .store
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(InvoiceResponse::from(invoice)))
}

pub async fn list_user_invoices(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let invoices = state.store.list_invoices_for_user(user_id).await?;
    Ok(Json(
        invoices.into_iter().map(InvoiceResponse::from).collect(),
    ))
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceStatusRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let status = InvoiceStatus::from_str(&payload.status).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown invoice status: {}",
            payload.status
        ))
    })?;

    // Provider-owned statuses only move through webhook reconciliation.
    if status.is_provider_managed() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Status '{}' is assigned by payment reconciliation and cannot be set manually",
            status.as_str()
        )));
    }

    let invoice = state
        .store
        .set_invoice_status(invoice_id, status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    tracing::info!(
        invoice_id = %invoice.id,
        status = status.as_str(),
        updated_by = %user.0.sub,
        "Invoice status updated"
    );

    Ok(Json(InvoiceResponse::from(invoice)))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_invoice(invoice_id).await? {
        tracing::info!(invoice_id = %invoice_id, "Invoice deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
    }
}

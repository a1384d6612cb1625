use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Payment, PaymentResponse, PaymentStatus};
use crate::services::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub user_id: Uuid,
    pub amount: f64,
    pub description: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentLinkRequest {
    #[serde(rename = "_id")]
    pub invoice_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PaymentLinkResponse {
    pub link: String,
    #[serde(rename = "_id")]
    pub invoice_id: Uuid,
    #[serde(rename = "paymongoId")]
    pub paymongo_id: String,
}

pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    if payload.amount <= 0.0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be greater than zero"
        )));
    }

    state
        .store
        .get_user(payload.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    let now = DateTime::now();
    let payment = Payment {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        amount: payload.amount,
        description: payload.description,
        payment_method: payload.payment_method,
        status: PaymentStatus::Pending,
        transaction_id: None,
        payment_date: None,
        created_at: now,
        updated_at: now,
    };

    state.store.insert_payment(payment.clone()).await?;
    tracing::info!(
        payment_id = %payment.id,
        user_id = %payment.user_id,
        amount = payment.amount,
        "Payment created"
    );

    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

pub async fn list_payments(
    State(state): State<AppState>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = state.store.list_payments().await?;
    Ok(Json(
        payments.into_iter().map(PaymentResponse::from).collect(),
    ))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state
        .store
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    Ok(Json(PaymentResponse::from(payment)))
}

pub async fn list_user_payments(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = state.store.list_payments_for_user(user_id).await?;
    Ok(Json(
        payments.into_iter().map(PaymentResponse::from).collect(),
    ))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let status = PaymentStatus::from_str(&payload.status).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown payment status: {}",
            payload.status
        ))
    })?;

    let payment = state
        .store
        .set_payment_status(payment_id, status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    tracing::info!(
        payment_id = %payment.id,
        status = status.as_str(),
        "Payment status updated"
    );

    Ok(Json(PaymentResponse::from(payment)))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_payment(payment_id).await? {
        tracing::info!(payment_id = %payment_id, "Payment deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Payment not found")))
    }
}

/// Mint a hosted checkout link for an invoice and move it to `sent`.
pub async fn create_payment_link(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentLinkRequest>,
) -> Result<Json<PaymentLinkResponse>, AppError> {
    let invoice_id = payload
        .invoice_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("_id is required")))?;

    let result = state.reconciler.create_payment_link(invoice_id).await;

    match &result {
        Ok(_) => {
            metrics::counter!("payment_links_created_total").increment(1);
        }
        Err(AppError::GatewayError { .. }) => {
            metrics::counter!("payment_link_failures_total").increment(1);
        }
        Err(_) => {}
    }

    let details = result?;
    Ok(Json(PaymentLinkResponse {
        link: details.checkout_url,
        invoice_id: details.invoice_id,
        paymongo_id: details.provider_reference_id,
    }))
}

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::models::InvoiceResponse;
use crate::services::reports::{monthly_trend, window_start, MonthlyTrendPoint};
use crate::services::{AppError, StatusSummary};
use crate::AppState;

const DEFAULT_TREND_MONTHS: u32 = 6;
const MAX_TREND_MONTHS: u32 = 120;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub months: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub invoices: Vec<StatusSummary>,
    pub payments: Vec<StatusSummary>,
    pub monthly_trend: Vec<MonthlyTrendPoint>,
}

#[derive(Debug, Serialize)]
pub struct RangeReport {
    pub start: String,
    pub end: String,
    pub total_amount: f64,
    pub invoices: Vec<InvoiceResponse>,
}

/// Dashboard aggregates: per-status group-bys for invoices and payments
/// plus a trailing monthly trend of completed payment volume.
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryReport>, AppError> {
    let months = query.months.unwrap_or(DEFAULT_TREND_MONTHS);
    if months == 0 || months > MAX_TREND_MONTHS {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "months must be between 1 and {}",
            MAX_TREND_MONTHS
        )));
    }

    let invoices = state.store.invoice_status_summary().await?;
    let payments = state.store.payment_status_summary().await?;

    let now = Utc::now();
    let start = window_start(now, months)
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Invalid trend window")))?;
    let completed = state
        .store
        .completed_payments_since(DateTime::from_chrono(start))
        .await?;

    Ok(Json(SummaryReport {
        invoices,
        payments,
        monthly_trend: monthly_trend(&completed, now, months),
    }))
}

/// Raw invoice dump over a creation-date range, oldest first.
pub async fn data(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<RangeReport>, AppError> {
    let start = parse_timestamp(&query.start, "start")?;
    let end = parse_timestamp(&query.end, "end")?;
    if end < start {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "end must not be before start"
        )));
    }

    let invoices = state
        .store
        .list_invoices_created_between(DateTime::from_chrono(start), DateTime::from_chrono(end))
        .await?;

    let total_amount = invoices.iter().map(|invoice| invoice.total_amount).sum();

    Ok(Json(RangeReport {
        start: query.start,
        end: query.end,
        total_amount,
        invoices: invoices.into_iter().map(InvoiceResponse::from).collect(),
    }))
}

fn parse_timestamp(value: &str, field: &str) -> Result<chrono::DateTime<Utc>, AppError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("{} must be an RFC 3339 timestamp", field))
        })
}

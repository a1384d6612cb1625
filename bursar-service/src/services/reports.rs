use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

use crate::models::{Payment, PaymentStatus};

/// One calendar month of completed-payment volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrendPoint {
    pub year: i32,
    pub month: u32,
    pub total_amount: f64,
    pub count: u64,
}

fn month_index(year: i32, month: u32) -> i64 {
    i64::from(year) * 12 + i64::from(month) - 1
}

/// First instant of the oldest month in a trailing window of `months`
/// ending in the month of `now`. Used as the query lower bound when
/// fetching payments for the trend.
pub fn window_start(now: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    if months == 0 {
        return None;
    }
    let start_index = month_index(now.year(), now.month()) - i64::from(months) + 1;
    let year = start_index.div_euclid(12) as i32;
    let month = start_index.rem_euclid(12) as u32 + 1;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

/// Bucket completed payments into calendar months over a trailing window
/// ending in the month of `now`. Points come back in ascending
/// year/month order; months with no payments are omitted.
pub fn monthly_trend(
    payments: &[Payment],
    now: DateTime<Utc>,
    months: u32,
) -> Vec<MonthlyTrendPoint> {
    if months == 0 {
        return Vec::new();
    }
    let end_index = month_index(now.year(), now.month());
    let start_index = end_index - i64::from(months) + 1;

    let mut buckets: BTreeMap<i64, (f64, u64)> = BTreeMap::new();
    for payment in payments {
        if payment.status != PaymentStatus::Completed {
            continue;
        }
        let Some(date) = payment.payment_date else {
            continue;
        };
        let date = date.to_chrono();
        let index = month_index(date.year(), date.month());
        if index < start_index || index > end_index {
            continue;
        }
        let entry = buckets.entry(index).or_insert((0.0, 0));
        entry.0 += payment.amount;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(index, (total_amount, count))| MonthlyTrendPoint {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
            total_amount,
            count,
        })
        .collect()
}

//! Month-over-month overlay: each month's balance keyed by day of month so
//! months of different lengths line up.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::balance::AccountLedger;
use crate::dates::{add_months_clamped, days_in_month, month_end, month_start};

pub const MAX_DAY_OFFSET: u32 = 31;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct DayPoint {
    pub day: u32,
    pub balance_cents: i64,
    /// Day past the end of a shorter month, holding its month-end balance.
    pub extended: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthSeries {
    /// `YYYY-MM`
    pub month: String,
    pub days_in_month: u32,
    pub points: Vec<DayPoint>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct SameDayStats {
    pub day: u32,
    pub months_compared: usize,
    pub min_cents: i64,
    pub max_cents: i64,
    pub mean_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthComparison {
    pub account_id: String,
    pub reference_date: NaiveDate,
    /// Oldest month first; the reference month is last.
    pub months: Vec<MonthSeries>,
    pub stats: Option<SameDayStats>,
}

/// Builds the overlay for the month of `reference_date` and up to
/// `prior_months` months before it.
///
/// The reference month stops at `reference_date`. Earlier months run to day
/// 31, holding their month-end balance flat past their last day. Months that
/// end before the account's first transaction are left out.
pub fn month_comparison(
    ledger: &AccountLedger,
    reference_date: NaiveDate,
    prior_months: u32,
) -> MonthComparison {
    let mut months = Vec::new();
    if let Some(first_posted) = ledger.first_date() {
        let reference_month = month_start(reference_date);
        for back in (0..=prior_months).rev() {
            let offset = i32::try_from(back).unwrap_or(i32::MAX);
            let start = add_months_clamped(reference_month, -offset);
            if month_end(start) < first_posted {
                continue;
            }
            let last_day = if back == 0 {
                reference_date.day()
            } else {
                MAX_DAY_OFFSET
            };
            months.push(month_series(ledger, start, last_day));
        }
    }

    let stats = same_day_stats(&months, reference_date.day());
    MonthComparison {
        account_id: ledger.account_id().to_string(),
        reference_date,
        months,
        stats,
    }
}

fn month_series(ledger: &AccountLedger, start: NaiveDate, last_day: u32) -> MonthSeries {
    let length = days_in_month(start.year(), start.month());
    let end = month_end(start);
    let points = (1..=last_day)
        .map(|day| {
            let extended = day > length;
            let date = if extended {
                end
            } else {
                start.with_day(day).unwrap_or(end)
            };
            DayPoint {
                day,
                balance_cents: ledger.balance_at(date),
                extended,
            }
        })
        .collect();

    MonthSeries {
        month: start.format("%Y-%m").to_string(),
        days_in_month: length,
        points,
    }
}

/// Min, max, and rounded mean across months at one day offset.
pub fn same_day_stats(months: &[MonthSeries], day: u32) -> Option<SameDayStats> {
    let values = months
        .iter()
        .filter_map(|series| series.points.iter().find(|point| point.day == day))
        .map(|point| point.balance_cents)
        .collect::<Vec<i64>>();
    let min_cents = *values.iter().min()?;
    let max_cents = *values.iter().max()?;
    let sum = values.iter().map(|value| i128::from(*value)).sum::<i128>();
    let mean_cents = (sum as f64 / values.len() as f64).round() as i64;

    Some(SameDayStats {
        day,
        months_compared: values.len(),
        min_cents,
        max_cents,
        mean_cents,
    })
}

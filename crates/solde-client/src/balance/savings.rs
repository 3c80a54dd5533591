use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::balance::AccountLedger;
use crate::dates::{add_months_clamped, clamped_day, month_start};

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SavingsPeriod {
    /// `YYYY-MM` of the month the period pays into.
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub start_balance_cents: i64,
    pub end_balance_cents: i64,
    pub saved_cents: i64,
}

/// Balance change between consecutive pay days.
///
/// Boundaries are the pay day of every month inside the account's history
/// (clamped to short months), plus the first and last posted dates so the
/// partial periods at either end are kept.
pub fn monthly_savings(ledger: &AccountLedger, pay_day: u32) -> Vec<SavingsPeriod> {
    let (Some(first), Some(last)) = (ledger.first_date(), ledger.last_date()) else {
        return Vec::new();
    };

    let mut boundaries = vec![first];
    let mut month = month_start(first);
    loop {
        let pay_date = clamped_day(month, pay_day);
        if pay_date > last {
            break;
        }
        if pay_date > first {
            boundaries.push(pay_date);
        }
        month = add_months_clamped(month, 1);
    }
    if boundaries.last().is_some_and(|boundary| *boundary < last) {
        boundaries.push(last);
    }

    boundaries
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let start_balance_cents = ledger.balance_at(start);
            let end_balance_cents = ledger.balance_at(end);
            SavingsPeriod {
                label: period_label(end, pay_day),
                start,
                end,
                start_balance_cents,
                end_balance_cents,
                saved_cents: end_balance_cents.saturating_sub(start_balance_cents),
            }
        })
        .collect()
}

/// A period ending past the pay day belongs to the following month.
fn period_label(end: NaiveDate, pay_day: u32) -> String {
    let month = if end.day() > clamped_day(end, pay_day).day() {
        add_months_clamped(month_start(end), 1)
    } else {
        month_start(end)
    };
    month.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::monthly_savings;
    use crate::balance::tests::{date, ledger};

    #[test]
    fn deltas_follow_pay_day_boundaries() {
        let ledger = ledger(
            0,
            &[
                ("2024-01-10", 100_000),
                ("2024-01-28", 200_000),
                ("2024-02-05", -50_000),
                ("2024-02-28", 200_000),
                ("2024-03-15", -30_000),
            ],
        );
        let periods = monthly_savings(&ledger, 28);

        let labels = periods.iter().map(|period| period.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);

        assert_eq!(periods[0].start, date("2024-01-10"));
        assert_eq!(periods[0].end, date("2024-01-28"));
        assert_eq!(periods[0].saved_cents, 200_000);

        assert_eq!(periods[1].start, date("2024-01-28"));
        assert_eq!(periods[1].end, date("2024-02-28"));
        assert_eq!(periods[1].saved_cents, 150_000);

        assert_eq!(periods[2].end, date("2024-03-15"));
        assert_eq!(periods[2].saved_cents, -30_000);
    }

    #[test]
    fn pay_day_clamps_to_short_months() {
        let ledger = ledger(0, &[("2023-01-31", 10), ("2023-02-28", 20), ("2023-03-31", 40)]);
        let periods = monthly_savings(&ledger, 31);
        let ends = periods.iter().map(|period| period.end).collect::<Vec<_>>();
        assert_eq!(ends, vec![date("2023-02-28"), date("2023-03-31")]);
        assert_eq!(periods[0].saved_cents, 20);
        assert_eq!(periods[1].saved_cents, 40);
    }

    #[test]
    fn trailing_period_past_pay_day_counts_toward_next_month() {
        let ledger = ledger(0, &[("2024-03-28", 10), ("2024-03-30", -3)]);
        let periods = monthly_savings(&ledger, 28);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].label, "2024-04");
        assert_eq!(periods[0].saved_cents, -3);
    }

    #[test]
    fn single_day_history_has_no_periods() {
        assert!(monthly_savings(&ledger(0, &[("2024-01-10", 5)]), 28).is_empty());
    }
}

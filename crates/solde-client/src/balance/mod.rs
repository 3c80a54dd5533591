pub mod checkpoints;
pub mod comparison;
pub mod savings;

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::accounts::require_account;
use crate::dates::{add_months_clamped, month_end, month_start, parse_stored_date};
use crate::state::map_sqlite_error;
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

/// Inclusive bounds. A missing bound defaults to the account's first or last
/// posted date.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct BalanceExtremes {
    pub min: BalancePoint,
    pub max: BalancePoint,
}

/// Per-day running totals of one account, loaded once and queried in memory.
#[derive(Debug, Clone)]
pub struct AccountLedger {
    account_id: String,
    opening_balance_cents: i64,
    dates: Vec<NaiveDate>,
    cumulative: Vec<i64>,
}

impl AccountLedger {
    /// Fails with `account_not_found` for an account the store has never seen.
    pub fn load(connection: &Connection, db_path: &Path, account_id: &str) -> ClientResult<Self> {
        let account = require_account(connection, db_path, account_id)?;

        let mut statement = connection
            .prepare(
                "SELECT posted_date, SUM(amount_cents)
                 FROM transactions
                 WHERE account_id = ?1
                 GROUP BY posted_date
                 ORDER BY posted_date ASC",
            )
            .map_err(|error| map_sqlite_error(db_path, &error))?;
        let rows = statement
            .query_map([account_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|error| map_sqlite_error(db_path, &error))?;

        let mut totals = Vec::new();
        for row in rows {
            let (raw_date, total) = row.map_err(|error| map_sqlite_error(db_path, &error))?;
            let date = parse_stored_date(&raw_date).ok_or_else(|| {
                ClientError::store_unavailable(
                    db_path,
                    &format!("Stored posted_date `{raw_date}` is not a YYYY-MM-DD date."),
                )
            })?;
            totals.push((date, total));
        }

        Ok(Self::from_daily_totals(
            &account.account_id,
            account.opening_balance_cents,
            totals,
        ))
    }

    /// `totals` must be sorted by date with one entry per date.
    pub fn from_daily_totals(
        account_id: &str,
        opening_balance_cents: i64,
        totals: Vec<(NaiveDate, i64)>,
    ) -> Self {
        let mut dates = Vec::with_capacity(totals.len());
        let mut cumulative = Vec::with_capacity(totals.len());
        let mut running = 0_i64;
        for (date, total) in totals {
            running = running.saturating_add(total);
            dates.push(date);
            cumulative.push(running);
        }
        Self {
            account_id: account_id.to_string(),
            opening_balance_cents,
            dates,
            cumulative,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn opening_balance_cents(&self) -> i64 {
        self.opening_balance_cents
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Sum of every stored amount, without the opening balance.
    pub fn total_cents(&self) -> i64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Opening balance plus every amount posted on or before `date`.
    pub fn balance_at(&self, date: NaiveDate) -> i64 {
        let index = self.dates.partition_point(|posted| *posted <= date);
        if index == 0 {
            return self.opening_balance_cents;
        }
        self.opening_balance_cents
            .saturating_add(self.cumulative[index - 1])
    }

    pub fn series(
        &self,
        range: DateRange,
        granularity: Granularity,
    ) -> ClientResult<Vec<BalancePoint>> {
        let (Some(first), Some(last)) = (self.first_date(), self.last_date()) else {
            return Ok(Vec::new());
        };
        let from = range.from.unwrap_or(first);
        let to = range.to.unwrap_or(last);
        if from > to {
            return Err(ClientError::invalid_argument_for_command(
                "Invalid date range: `from` must be on or before `to`.",
                Some("balance show"),
            ));
        }

        let points = match granularity {
            Granularity::Daily => from
                .iter_days()
                .take_while(|date| *date <= to)
                .map(|date| self.point(date))
                .collect(),
            Granularity::Monthly => {
                let mut points = Vec::new();
                let mut cursor = from;
                loop {
                    points.push(self.point(month_end(cursor).min(to)));
                    let next = add_months_clamped(month_start(cursor), 1);
                    if next > to {
                        break;
                    }
                    cursor = next;
                }
                points
            }
        };
        Ok(points)
    }

    fn point(&self, date: NaiveDate) -> BalancePoint {
        BalancePoint {
            date,
            balance_cents: self.balance_at(date),
        }
    }
}

/// Balance series for one account at the requested granularity.
pub fn balances(
    connection: &Connection,
    db_path: &Path,
    account_id: &str,
    range: DateRange,
    granularity: Granularity,
) -> ClientResult<Vec<BalancePoint>> {
    AccountLedger::load(connection, db_path, account_id)?.series(range, granularity)
}

/// Lowest and highest points; the earliest date wins ties.
pub fn extremes(points: &[BalancePoint]) -> Option<BalanceExtremes> {
    let mut iter = points.iter();
    let first = *iter.next()?;
    let mut found = BalanceExtremes {
        min: first,
        max: first,
    };
    for point in iter {
        if point.balance_cents < found.min.balance_cents {
            found.min = *point;
        }
        if point.balance_cents > found.max.balance_cents {
            found.max = *point;
        }
    }
    Some(found)
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::{AccountLedger, DateRange, Granularity, extremes};

    pub(crate) fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_default()
    }

    pub(crate) fn ledger(opening: i64, totals: &[(&str, i64)]) -> AccountLedger {
        AccountLedger::from_daily_totals(
            "acct",
            opening,
            totals
                .iter()
                .map(|(day, cents)| (date(day), *cents))
                .collect(),
        )
    }

    #[test]
    fn daily_series_covers_every_day_inclusive() {
        let ledger = ledger(1_000, &[("2024-01-30", -200), ("2024-02-02", 500)]);
        let points = ledger.series(DateRange::default(), Granularity::Daily);
        assert!(points.is_ok());
        if let Ok(points) = points {
            let balances = points.iter().map(|point| point.balance_cents).collect::<Vec<_>>();
            assert_eq!(balances, vec![800, 800, 800, 1_300]);
            assert_eq!(points[0].date, date("2024-01-30"));
            assert_eq!(points[3].date, date("2024-02-02"));
        }
    }

    #[test]
    fn monthly_points_sit_at_month_end_or_range_end() {
        let ledger = ledger(0, &[("2024-01-15", 100), ("2024-02-10", 50), ("2024-03-05", 25)]);
        let points = ledger.series(DateRange::default(), Granularity::Monthly);
        assert!(points.is_ok());
        if let Ok(points) = points {
            let dates = points.iter().map(|point| point.date).collect::<Vec<_>>();
            assert_eq!(
                dates,
                vec![date("2024-01-31"), date("2024-02-29"), date("2024-03-05")]
            );
            assert_eq!(points[2].balance_cents, 175);
        }
    }

    #[test]
    fn balance_before_first_transaction_is_opening() {
        let ledger = ledger(4_200, &[("2024-05-01", 1)]);
        assert_eq!(ledger.balance_at(date("2024-04-30")), 4_200);
        assert_eq!(ledger.balance_at(date("2030-01-01")), 4_201);
    }

    #[test]
    fn empty_ledger_yields_empty_series() {
        let ledger = ledger(0, &[]);
        let points = ledger.series(DateRange::default(), Granularity::Daily);
        assert!(points.is_ok_and(|points| points.is_empty()));
    }

    #[test]
    fn running_totals_saturate_instead_of_wrapping() {
        let ledger = ledger(
            i64::MAX - 5,
            &[("2024-01-01", i64::MAX / 2), ("2024-01-02", i64::MAX / 2 + 10)],
        );
        assert_eq!(ledger.balance_at(date("2024-01-02")), i64::MAX);
        assert_eq!(ledger.total_cents(), i64::MAX);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let ledger = ledger(0, &[("2024-05-01", 1)]);
        let range = DateRange {
            from: Some(date("2024-06-01")),
            to: Some(date("2024-05-01")),
        };
        assert!(ledger.series(range, Granularity::Daily).is_err());
    }

    #[test]
    fn extremes_prefer_earliest_on_ties() {
        let ledger = ledger(0, &[("2024-01-01", 10), ("2024-01-02", -20), ("2024-01-04", 30)]);
        let points = ledger
            .series(DateRange::default(), Granularity::Daily)
            .unwrap_or_default();
        let found = extremes(&points);
        assert!(found.is_some());
        if let Some(found) = found {
            assert_eq!(found.min.date, date("2024-01-02"));
            assert_eq!(found.min.balance_cents, -10);
            assert_eq!(found.max.date, date("2024-01-04"));
            assert_eq!(found.max.balance_cents, 20);
        }
        assert!(extremes(&[]).is_none());
    }
}

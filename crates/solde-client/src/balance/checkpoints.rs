use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

use crate::balance::AccountLedger;
use crate::dates::parse_stored_date;
use crate::state::map_sqlite_error;
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct Checkpoint {
    pub as_of_date: NaiveDate,
    pub statement_balance_cents: i64,
    pub ledger_balance_cents: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct CheckpointMismatch {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub statement_delta_cents: i64,
    pub ledger_delta_cents: i64,
    /// Positive when the bank saw more money move in than the store holds.
    pub missing_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckpointReport {
    pub account_id: String,
    pub healthy: bool,
    pub checkpoints: Vec<Checkpoint>,
    pub mismatches: Vec<CheckpointMismatch>,
}

pub fn load_statement_balances(
    connection: &Connection,
    db_path: &Path,
    account_id: &str,
) -> ClientResult<Vec<(NaiveDate, i64)>> {
    let mut statement = connection
        .prepare(
            "SELECT as_of_date, balance_cents
             FROM statement_balances
             WHERE account_id = ?1
             ORDER BY as_of_date ASC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows = statement
        .query_map([account_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut balances = Vec::new();
    for row in rows {
        let (raw_date, balance_cents) = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        let as_of_date = parse_stored_date(&raw_date).ok_or_else(|| {
            ClientError::store_unavailable(
                db_path,
                &format!("Stored as_of_date `{raw_date}` is not a YYYY-MM-DD date."),
            )
        })?;
        balances.push((as_of_date, balance_cents));
    }
    Ok(balances)
}

/// Compares the movement between consecutive bank-reported balances with
/// the movement of stored transactions over the same span. A gap means
/// transactions are missing from the store, or were imported twice under
/// different keys.
pub fn check(ledger: &AccountLedger, statement_balances: &[(NaiveDate, i64)]) -> CheckpointReport {
    let checkpoints = statement_balances
        .iter()
        .map(|(as_of_date, statement_balance_cents)| Checkpoint {
            as_of_date: *as_of_date,
            statement_balance_cents: *statement_balance_cents,
            ledger_balance_cents: ledger.balance_at(*as_of_date),
        })
        .collect::<Vec<Checkpoint>>();

    let mut mismatches = Vec::new();
    for pair in checkpoints.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        let statement_delta_cents = later
            .statement_balance_cents
            .saturating_sub(earlier.statement_balance_cents);
        let ledger_delta_cents = later
            .ledger_balance_cents
            .saturating_sub(earlier.ledger_balance_cents);
        if statement_delta_cents != ledger_delta_cents {
            warn!(
                account_id = ledger.account_id(),
                from = %earlier.as_of_date,
                to = %later.as_of_date,
                statement_delta_cents,
                ledger_delta_cents,
                "statement balances disagree with stored transactions"
            );
            mismatches.push(CheckpointMismatch {
                from_date: earlier.as_of_date,
                to_date: later.as_of_date,
                statement_delta_cents,
                ledger_delta_cents,
                missing_cents: statement_delta_cents.saturating_sub(ledger_delta_cents),
            });
        }
    }

    CheckpointReport {
        account_id: ledger.account_id().to_string(),
        healthy: mismatches.is_empty(),
        checkpoints,
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::check;
    use crate::balance::tests::{date, ledger};

    #[test]
    fn consistent_checkpoints_are_healthy() {
        let ledger = ledger(0, &[("2024-01-05", -1_000), ("2024-01-20", 3_000)]);
        let report = check(
            &ledger,
            &[(date("2024-01-01"), 10_000), (date("2024-01-31"), 12_000)],
        );
        assert!(report.healthy);
        assert_eq!(report.checkpoints.len(), 2);
        assert_eq!(report.checkpoints[1].ledger_balance_cents, 2_000);
    }

    #[test]
    fn gap_between_checkpoints_is_reported() {
        let ledger = ledger(0, &[("2024-01-05", -1_000)]);
        let report = check(
            &ledger,
            &[
                (date("2024-01-01"), 10_000),
                (date("2024-01-31"), 8_500),
                (date("2024-02-29"), 8_500),
            ],
        );
        assert!(!report.healthy);
        assert_eq!(report.mismatches.len(), 1);
        let mismatch = report.mismatches[0];
        assert_eq!(mismatch.to_date, date("2024-01-31"));
        assert_eq!(mismatch.statement_delta_cents, -1_500);
        assert_eq!(mismatch.ledger_delta_cents, -1_000);
        assert_eq!(mismatch.missing_cents, -500);
    }

    #[test]
    fn single_checkpoint_cannot_disagree() {
        let ledger = ledger(0, &[("2024-01-05", -1_000)]);
        assert!(check(&ledger, &[(date("2024-01-31"), 1)]).healthy);
    }
}

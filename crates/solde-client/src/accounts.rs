use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::contracts::types::{AccountSummary, StatementBalanceRow};
use crate::dates::{format_iso_date, parse_stored_date};
use crate::import::persist::now_timestamp;
use crate::state::map_sqlite_error;
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AccountRecord {
    pub account_id: String,
    pub display_name: Option<String>,
    pub opening_balance_cents: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OpeningBalance {
    Cents(i64),
    /// Back-computed so the ledger matches the latest statement balance.
    FromLatestStatement,
}

pub fn require_account(
    connection: &Connection,
    db_path: &Path,
    account_id: &str,
) -> ClientResult<AccountRecord> {
    connection
        .query_row(
            "SELECT account_id, display_name, opening_balance_cents
             FROM accounts
             WHERE account_id = ?1",
            [account_id],
            |row| {
                Ok(AccountRecord {
                    account_id: row.get(0)?,
                    display_name: row.get(1)?,
                    opening_balance_cents: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .ok_or_else(|| ClientError::account_not_found(account_id))
}

/// Registers an account, or renames it when `display_name` is given.
pub fn register_account(
    connection: &Connection,
    db_path: &Path,
    account_id: &str,
    display_name: Option<&str>,
) -> ClientResult<AccountRecord> {
    let account_id = account_id.trim();
    if account_id.is_empty() {
        return Err(ClientError::invalid_argument_for_command(
            "Account id must not be empty.",
            Some("account add"),
        ));
    }

    connection
        .execute(
            "INSERT INTO accounts (account_id, display_name, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(account_id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, accounts.display_name)",
            params![account_id, display_name, now_timestamp()],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    info!(account_id, "account registered");
    require_account(connection, db_path, account_id)
}

pub fn set_opening_balance(
    connection: &Connection,
    db_path: &Path,
    account_id: &str,
    opening: OpeningBalance,
) -> ClientResult<AccountRecord> {
    require_account(connection, db_path, account_id)?;

    let cents = match opening {
        OpeningBalance::Cents(cents) => cents,
        OpeningBalance::FromLatestStatement => {
            let latest = latest_statement(connection, db_path, account_id)?.ok_or_else(|| {
                ClientError::invalid_argument_with_recovery(
                    &format!("Account `{account_id}` has no recorded statement balance."),
                    vec![
                        "Import an OFX file with a LEDGERBAL, or a CSV whose profile sets `balance_pattern`."
                            .to_string(),
                        "Or pass the opening balance explicitly.".to_string(),
                    ],
                )
            })?;
            let posted_through = connection
                .query_row(
                    "SELECT COALESCE(SUM(amount_cents), 0)
                     FROM transactions
                     WHERE account_id = ?1 AND posted_date <= ?2",
                    params![account_id, format_iso_date(&latest.as_of_date)],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(|error| map_sqlite_error(db_path, &error))?;
            latest.balance_cents.saturating_sub(posted_through)
        }
    };

    connection
        .execute(
            "UPDATE accounts SET opening_balance_cents = ?2 WHERE account_id = ?1",
            params![account_id, cents],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    info!(account_id, opening_balance_cents = cents, "opening balance set");
    require_account(connection, db_path, account_id)
}

pub fn list_accounts(connection: &Connection, db_path: &Path) -> ClientResult<Vec<AccountSummary>> {
    let mut statement = connection
        .prepare(
            "SELECT
                a.account_id,
                a.display_name,
                a.opening_balance_cents,
                COUNT(t.id),
                MIN(t.posted_date),
                MAX(t.posted_date),
                COALESCE(SUM(t.amount_cents), 0)
             FROM accounts a
             LEFT JOIN transactions t ON t.account_id = a.account_id
             GROUP BY a.account_id
             ORDER BY a.account_id ASC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows = statement
        .query_map([], |row| {
            let opening_balance_cents = row.get::<_, i64>(2)?;
            let total = row.get::<_, i64>(6)?;
            Ok(AccountSummary {
                account_id: row.get(0)?,
                display_name: row.get(1)?,
                opening_balance_cents,
                transaction_count: row.get(3)?,
                first_posted_date: row
                    .get::<_, Option<String>>(4)?
                    .as_deref()
                    .and_then(parse_stored_date),
                last_posted_date: row
                    .get::<_, Option<String>>(5)?
                    .as_deref()
                    .and_then(parse_stored_date),
                current_balance_cents: opening_balance_cents.saturating_add(total),
                latest_statement: None,
            })
        })
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut accounts = Vec::new();
    for row in rows {
        let mut summary = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        summary.latest_statement = latest_statement(connection, db_path, &summary.account_id)?;
        accounts.push(summary);
    }
    Ok(accounts)
}

fn latest_statement(
    connection: &Connection,
    db_path: &Path,
    account_id: &str,
) -> ClientResult<Option<StatementBalanceRow>> {
    let row = connection
        .query_row(
            "SELECT as_of_date, balance_cents
             FROM statement_balances
             WHERE account_id = ?1
             ORDER BY as_of_date DESC
             LIMIT 1",
            [account_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(row.and_then(|(raw_date, balance_cents)| {
        parse_stored_date(&raw_date).map(|as_of_date| StatementBalanceRow {
            as_of_date,
            balance_cents,
        })
    }))
}

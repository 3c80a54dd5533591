use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::{Transaction, params};

use crate::ClientResult;
use crate::dates::format_iso_date;
use crate::import::{CanonicalTransaction, ImportFormat, StatementBalance};
use crate::state::map_sqlite_error;

#[derive(Debug, Clone)]
pub(crate) struct PersistResult {
    pub(crate) inserted: i64,
    pub(crate) balances_recorded: i64,
    /// Accounts this batch registered for the first time.
    pub(crate) new_accounts: BTreeSet<String>,
}

pub(crate) struct PersistInput<'a> {
    pub(crate) import_id: &'a str,
    pub(crate) source_path: &'a str,
    pub(crate) format: ImportFormat,
    pub(crate) rows_read: i64,
    pub(crate) accounts: &'a BTreeSet<String>,
    pub(crate) rows: &'a [CanonicalTransaction],
    pub(crate) skipped: i64,
    pub(crate) balances: &'a [StatementBalance],
}

/// Writes one import into `transaction`. The caller owns commit or rollback.
pub(crate) fn write_batch(
    transaction: &Transaction<'_>,
    db_path: &Path,
    input: PersistInput<'_>,
) -> ClientResult<PersistResult> {
    let timestamp = now_timestamp();

    // The run row goes first so every row below references an existing import.
    transaction
        .execute(
            "INSERT INTO import_runs (
                import_id,
                created_at,
                source_path,
                format,
                rows_read,
                inserted,
                skipped
             ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                input.import_id,
                &timestamp,
                input.source_path,
                input.format.as_str(),
                input.rows_read,
                input.skipped
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut new_accounts = BTreeSet::new();
    for account_id in input.accounts {
        let changed = transaction
            .execute(
                "INSERT OR IGNORE INTO accounts (account_id, created_at) VALUES (?1, ?2)",
                params![account_id, &timestamp],
            )
            .map_err(|error| map_sqlite_error(db_path, &error))?;
        if changed > 0 {
            new_accounts.insert(account_id.clone());
        }
    }

    let mut inserted = 0_i64;
    {
        let mut statement = transaction
            .prepare(
                "INSERT INTO transactions (
                    account_id,
                    posted_date,
                    amount_cents,
                    description,
                    source_ref,
                    fingerprint,
                    import_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(|error| map_sqlite_error(db_path, &error))?;
        for row in input.rows {
            statement
                .execute(params![
                    &row.account_id,
                    format_iso_date(&row.posted_date),
                    row.amount_cents,
                    &row.description,
                    &row.source_ref,
                    &row.fingerprint,
                    input.import_id
                ])
                .map_err(|error| map_sqlite_error(db_path, &error))?;
            inserted += 1;
        }
    }

    // First write wins: a later export never rewrites a recorded balance.
    let mut balances_recorded = 0_i64;
    for balance in input.balances {
        let changed = transaction
            .execute(
                "INSERT OR IGNORE INTO statement_balances (
                    account_id,
                    as_of_date,
                    balance_cents,
                    import_id
                 ) VALUES (?1, ?2, ?3, ?4)",
                params![
                    &balance.account_id,
                    format_iso_date(&balance.as_of_date),
                    balance.balance_cents,
                    input.import_id
                ],
            )
            .map_err(|error| map_sqlite_error(db_path, &error))?;
        balances_recorded += changed as i64;
    }

    transaction
        .execute(
            "UPDATE import_runs SET inserted = ?2 WHERE import_id = ?1",
            params![input.import_id, inserted],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(PersistResult {
        inserted,
        balances_recorded,
        new_accounts,
    })
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

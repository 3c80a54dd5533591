pub(crate) mod dedupe;
pub mod delimited;
pub mod fingerprint;
pub(crate) mod input;
pub(crate) mod ofx;
pub(crate) mod persist;
pub(crate) mod runs;

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};
use ulid::Ulid;

use crate::accounts::{OpeningBalance, set_opening_balance};
use crate::contracts::types::{DuplicateRow, DuplicateSummary, ImportReport, TransactionRow};
use crate::import::delimited::ColumnMapping;
use crate::state::map_sqlite_error;
use crate::{ClientError, ClientResult};

pub use runs::list_import_runs;

const PREVIEW_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    Ofx,
    Csv,
}

impl ImportFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ofx => "ofx",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportFormat {
    type Err = ClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ofx" | "qfx" => Ok(Self::Ofx),
            "csv" => Ok(Self::Csv),
            other => Err(ClientError::invalid_argument_for_command(
                &format!("Unknown import format `{other}`; expected `ofx` or `csv`."),
                Some("import create"),
            )),
        }
    }
}

/// A record as read from the file, before fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub account_id: String,
    pub posted_date: NaiveDate,
    pub amount_cents: i64,
    pub description: String,
    pub source_ref: Option<String>,
    /// CSV line number or OFX transaction ordinal.
    pub source_row: i64,
}

/// A bank-reported balance found inside an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementBalance {
    pub account_id: String,
    pub as_of_date: NaiveDate,
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedStatement {
    pub records: Vec<ParsedRecord>,
    pub balances: Vec<StatementBalance>,
}

#[derive(Debug, Clone)]
pub(crate) struct CanonicalTransaction {
    pub(crate) account_id: String,
    pub(crate) posted_date: NaiveDate,
    pub(crate) amount_cents: i64,
    pub(crate) description: String,
    pub(crate) source_ref: Option<String>,
    pub(crate) fingerprint: String,
    pub(crate) source_row: i64,
}

impl CanonicalTransaction {
    fn from_parsed(record: ParsedRecord) -> Self {
        let fingerprint = fingerprint::compute(
            &record.account_id,
            record.posted_date,
            record.amount_cents,
            &record.description,
        );
        Self {
            account_id: record.account_id,
            posted_date: record.posted_date,
            amount_cents: record.amount_cents,
            description: record.description,
            source_ref: record.source_ref.filter(|value| !value.trim().is_empty()),
            fingerprint,
            source_row: record.source_row,
        }
    }

    pub(crate) fn to_contract(&self) -> TransactionRow {
        TransactionRow {
            account_id: self.account_id.clone(),
            posted_date: self.posted_date,
            amount_cents: self.amount_cents,
            description: self.description.clone(),
            source_ref: self.source_ref.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImportRequest<'a> {
    pub path: &'a Path,
    /// Inferred from the file extension when absent.
    pub format: Option<ImportFormat>,
    pub mapping: Option<&'a ColumnMapping>,
    /// Replaces the account id read from the file or the CSV profile.
    pub account_override: Option<&'a str>,
    pub dry_run: bool,
}

/// Parses an export into records in source order plus any statement balances.
///
/// CSV input needs a column mapping. Every problem in the file is collected
/// before failing, so the error lists all offending rows at once.
pub fn parse(
    bytes: &[u8],
    format: ImportFormat,
    mapping: Option<&ColumnMapping>,
    account_override: Option<&str>,
) -> ClientResult<ParsedStatement> {
    let text = input::decode_text(bytes);
    match format {
        ImportFormat::Ofx => ofx::parse(&text, account_override),
        ImportFormat::Csv => {
            let mapping = mapping.ok_or_else(|| {
                ClientError::invalid_argument_with_recovery(
                    "CSV imports need a column mapping.",
                    vec![
                        "Pass `--profile <name>` naming a `[csv_profiles.<name>]` table in config.toml."
                            .to_string(),
                        "Or set `defaults.csv_profile` in config.toml.".to_string(),
                    ],
                )
            })?;
            let account_id = account_override
                .or(mapping.account_id.as_deref())
                .ok_or_else(|| {
                    ClientError::invalid_argument_with_recovery(
                        "CSV exports carry no account id; none was configured.",
                        vec![
                            "Pass `--account <id>`.".to_string(),
                            "Or set `account_id` in the CSV profile.".to_string(),
                        ],
                    )
                })?;
            delimited::parse(&text, mapping, account_id)
        }
    }
}

pub fn import_file(
    connection: &mut Connection,
    db_path: &Path,
    request: &ImportRequest<'_>,
) -> ClientResult<ImportReport> {
    let format = match request.format {
        Some(format) => format,
        None => input::infer_format(request.path)?,
    };
    let bytes = input::read_source(request.path)?;
    let statement = parse(&bytes, format, request.mapping, request.account_override)?;
    debug!(
        path = %request.path.display(),
        %format,
        records = statement.records.len(),
        balances = statement.balances.len(),
        "parsed import file"
    );

    import_statement(
        connection,
        db_path,
        &request.path.display().to_string(),
        format,
        statement,
        request.dry_run,
    )
}

/// Merges parsed records into the store.
///
/// Key lookup, duplicate decisions, and inserts share one IMMEDIATE
/// transaction. Any exit before the commit drops the transaction, which rolls
/// it back, so a failed batch leaves nothing behind. A dry run performs the
/// same writes and then rolls back explicitly.
pub fn import_statement(
    connection: &mut Connection,
    db_path: &Path,
    source_path: &str,
    format: ImportFormat,
    statement: ParsedStatement,
    dry_run: bool,
) -> ClientResult<ImportReport> {
    let rows_read = statement.records.len() as i64;
    let rows = statement
        .records
        .into_iter()
        .map(CanonicalTransaction::from_parsed)
        .collect::<Vec<CanonicalTransaction>>();
    let accounts = rows
        .iter()
        .map(|row| row.account_id.clone())
        .chain(
            statement
                .balances
                .iter()
                .map(|balance| balance.account_id.clone()),
        )
        .collect::<BTreeSet<String>>();

    let import_id = format!("imp_{}", Ulid::new());
    let transaction = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let existing = dedupe::load_existing_keys(&transaction, &accounts, db_path)?;
    let outcome = dedupe::partition(rows, &existing);

    let persisted = persist::write_batch(
        &transaction,
        db_path,
        persist::PersistInput {
            import_id: &import_id,
            source_path,
            format,
            rows_read,
            accounts: &accounts,
            rows: &outcome.insertable,
            skipped: outcome.duplicates.len() as i64,
            balances: &statement.balances,
        },
    )?;

    // A first statement balance anchors a fresh account's ledger.
    let with_balance = statement
        .balances
        .iter()
        .map(|balance| balance.account_id.as_str())
        .collect::<BTreeSet<&str>>();
    for account_id in persisted
        .new_accounts
        .iter()
        .filter(|account_id| with_balance.contains(account_id.as_str()))
    {
        set_opening_balance(&transaction, db_path, account_id, OpeningBalance::FromLatestStatement)?;
    }

    if dry_run {
        transaction
            .rollback()
            .map_err(|error| map_sqlite_error(db_path, &error))?;
        debug!(source_path, "dry run rolled back");
    } else {
        transaction
            .commit()
            .map_err(|error| map_sqlite_error(db_path, &error))?;
        info!(
            %import_id,
            source_path,
            inserted = persisted.inserted,
            skipped = outcome.duplicates.len(),
            "import committed"
        );
    }

    let batch = outcome
        .duplicates
        .iter()
        .filter(|duplicate| duplicate.reason == dedupe::DedupeReason::Batch)
        .count() as i64;
    let skipped = outcome.duplicates.len() as i64;

    Ok(ImportReport {
        dry_run,
        import_id: if dry_run { None } else { Some(import_id) },
        source_path: source_path.to_string(),
        format: format.as_str().to_string(),
        rows_read,
        inserted: persisted.inserted,
        skipped,
        duplicate_summary: DuplicateSummary {
            total: skipped,
            batch,
            existing_store: skipped - batch,
        },
        accounts: accounts.into_iter().collect(),
        statement_balances_recorded: persisted.balances_recorded,
        new_rows_preview: outcome
            .insertable
            .iter()
            .take(PREVIEW_LIMIT)
            .map(CanonicalTransaction::to_contract)
            .collect(),
        duplicates_preview: outcome
            .duplicates
            .iter()
            .take(PREVIEW_LIMIT)
            .map(|duplicate| DuplicateRow {
                source_row: duplicate.row.source_row,
                reason: duplicate.reason.as_str().to_string(),
                matched_on: duplicate.matched_on.as_str().to_string(),
                transaction: duplicate.row.to_contract(),
            })
            .collect(),
        parse_errors: Vec::new(),
    })
}

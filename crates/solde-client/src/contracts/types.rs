use chrono::NaiveDate;
use serde::Serialize;

use crate::balance::savings::SavingsPeriod;
use crate::balance::{BalanceExtremes, BalancePoint, Granularity};

/// One problem found while parsing a file. `row` is the CSV line number or
/// the 1-based OFX transaction ordinal.
#[derive(Debug, Clone, Serialize)]
pub struct ImportIssue {
    pub row: i64,
    pub field: String,
    pub code: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRow {
    pub account_id: String,
    pub posted_date: NaiveDate,
    pub amount_cents: i64,
    pub description: String,
    pub source_ref: Option<String>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateRow {
    pub source_row: i64,
    pub reason: String,
    pub matched_on: String,
    pub transaction: TransactionRow,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateSummary {
    pub total: i64,
    pub batch: i64,
    pub existing_store: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    pub source_path: String,
    pub format: String,
    pub rows_read: i64,
    pub inserted: i64,
    pub skipped: i64,
    pub duplicate_summary: DuplicateSummary,
    pub accounts: Vec<String>,
    pub statement_balances_recorded: i64,
    pub new_rows_preview: Vec<TransactionRow>,
    pub duplicates_preview: Vec<DuplicateRow>,
    /// Always empty on success; a file with parse errors fails as a whole.
    pub parse_errors: Vec<ImportIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportData {
    pub message: String,
    pub files: Vec<ImportReport>,
    pub inserted: i64,
    pub skipped: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportListItem {
    pub import_id: String,
    pub created_at: String,
    pub source_path: String,
    pub format: String,
    pub rows_read: i64,
    pub inserted: i64,
    pub skipped: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportListData {
    pub rows: Vec<ImportListItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementBalanceRow {
    pub as_of_date: NaiveDate,
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub display_name: Option<String>,
    pub opening_balance_cents: i64,
    pub transaction_count: i64,
    pub first_posted_date: Option<NaiveDate>,
    pub last_posted_date: Option<NaiveDate>,
    pub current_balance_cents: i64,
    pub latest_statement: Option<StatementBalanceRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountListData {
    pub accounts: Vec<AccountSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceSeriesData {
    pub account_id: String,
    pub display_name: Option<String>,
    pub granularity: Granularity,
    pub opening_balance_cents: i64,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub points: Vec<BalancePoint>,
    pub extremes: Option<BalanceExtremes>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsData {
    pub account_id: String,
    pub pay_day: u32,
    pub periods: Vec<SavingsPeriod>,
    pub total_saved_cents: i64,
}

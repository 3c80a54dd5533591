use std::collections::HashMap;

use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

const BOOTSTRAP_SQL: &str = include_str!("migrations/0001_bootstrap.sql");
const ADD_STATEMENT_BALANCES_SQL: &str = include_str!("migrations/0002_statement_balances.sql");

pub const EXPECTED_USER_VERSION: i64 = 2;

pub const REQUIRED_INDEX_NAMES: [&str; 4] = [
    "idx_transactions_account_source_ref",
    "idx_transactions_account_fingerprint",
    "idx_transactions_account_posted_date",
    "idx_import_runs_created_at_desc",
];

pub const REQUIRED_META_KEYS: [(&str, &str); 2] =
    [("schema_version", "v1"), ("fingerprint_version", "v1")];

pub fn run_pending(conn: &mut Connection) -> rusqlite_migration::Result<()> {
    let migrations = Migrations::new(vec![
        M::up(BOOTSTRAP_SQL),
        M::up(ADD_STATEMENT_BALANCES_SQL),
    ]);
    migrations.to_latest(conn)
}

/// Canonical `CREATE INDEX` text for an index declared in the bootstrap
/// migration, used to restore indexes dropped out from under the store.
pub fn index_statement(index_name: &str) -> Option<String> {
    parse_index_blocks().remove(index_name)
}

fn parse_index_blocks() -> HashMap<String, String> {
    let mut blocks: HashMap<String, String> = HashMap::new();
    let mut active_name: Option<String> = None;
    let mut active_sql = String::new();

    for line in BOOTSTRAP_SQL.lines() {
        let trimmed = line.trim();

        if let Some(name) = trimmed.strip_prefix("-- solde:index:start:") {
            active_name = Some(name.to_string());
            active_sql.clear();
            continue;
        }

        if let Some(name) = trimmed.strip_prefix("-- solde:index:end:") {
            if let Some(active) = &active_name
                && active == name
            {
                blocks.insert(name.to_string(), active_sql.trim().to_string());
            }
            active_name = None;
            active_sql.clear();
            continue;
        }

        if active_name.is_some() {
            active_sql.push_str(line);
            active_sql.push('\n');
        }
    }

    blocks
}

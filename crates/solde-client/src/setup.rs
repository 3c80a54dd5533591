use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::config::Settings;
use crate::migrations::{
    EXPECTED_USER_VERSION, REQUIRED_INDEX_NAMES, REQUIRED_META_KEYS, index_statement, run_pending,
};
use crate::state::{
    config_path, ensure_store_directory, map_sqlite_error, open_connection, resolve_store_home,
    store_db_path,
};
use crate::{ClientError, ClientResult};

const META_COLUMNS: [&str; 2] = ["key", "value"];
const ACCOUNTS_COLUMNS: [&str; 4] = [
    "account_id",
    "display_name",
    "opening_balance_cents",
    "created_at",
];
const IMPORT_RUNS_COLUMNS: [&str; 7] = [
    "import_id",
    "created_at",
    "source_path",
    "format",
    "rows_read",
    "inserted",
    "skipped",
];
const TRANSACTIONS_COLUMNS: [&str; 8] = [
    "id",
    "account_id",
    "posted_date",
    "amount_cents",
    "description",
    "source_ref",
    "fingerprint",
    "import_id",
];
const STATEMENT_BALANCES_COLUMNS: [&str; 4] =
    ["account_id", "as_of_date", "balance_cents", "import_id"];

const REQUIRED_CORE_TABLES: [(&str, &[&str]); 5] = [
    ("meta", &META_COLUMNS),
    ("accounts", &ACCOUNTS_COLUMNS),
    ("import_runs", &IMPORT_RUNS_COLUMNS),
    ("transactions", &TRANSACTIONS_COLUMNS),
    ("statement_balances", &STATEMENT_BALANCES_COLUMNS),
];

#[derive(Debug, Clone)]
pub struct SetupContext {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub schema_version: String,
    pub settings: Settings,
}

pub fn ensure_initialized() -> ClientResult<SetupContext> {
    ensure_initialized_with_home_override(None)
}

pub fn ensure_initialized_at(home_override: &Path) -> ClientResult<SetupContext> {
    ensure_initialized_with_home_override(Some(home_override))
}

pub(crate) fn ensure_initialized_with_home_override(
    home_override: Option<&Path>,
) -> ClientResult<SetupContext> {
    let store_home = resolve_store_home(home_override)?;
    ensure_store_directory(&store_home)?;
    let settings = Settings::load(&config_path(&store_home))?;

    let db_path = store_db_path(&store_home);
    let mut connection = open_connection(&db_path)?;

    run_pending(&mut connection).map_err(|error| map_migration_error(&db_path, &error))?;

    verify_core_tables(&connection, &db_path)?;
    repair_missing_objects(&connection, &db_path)?;
    verify_store_version(&connection, &db_path)?;

    let schema_version = read_schema_version(&connection, &db_path)?;
    debug!(db_path = %db_path.display(), %schema_version, "store ready");

    Ok(SetupContext {
        home: store_home,
        db_path,
        schema_version,
        settings,
    })
}

fn map_migration_error(db_path: &Path, error: &rusqlite_migration::Error) -> ClientError {
    match error {
        rusqlite_migration::Error::RusqliteError { query: _, err } => {
            let mapped = map_sqlite_error(db_path, err);
            if mapped.code == "store_locked"
                || mapped.code == "store_corrupt"
                || mapped.code == "store_init_permission_denied"
            {
                mapped
            } else {
                ClientError::migration_failed(db_path, &error.to_string())
            }
        }
        _ => ClientError::migration_failed(db_path, &error.to_string()),
    }
}

fn verify_core_tables(connection: &Connection, db_path: &Path) -> ClientResult<()> {
    for (table_name, required_columns) in REQUIRED_CORE_TABLES {
        if !sqlite_object_exists(connection, "table", table_name, db_path)? {
            return Err(ClientError::store_corrupt(db_path));
        }

        let columns = table_columns(connection, table_name, db_path)?;
        for required_column in required_columns {
            if !columns.iter().any(|column| column == required_column) {
                return Err(ClientError::store_corrupt(db_path));
            }
        }
    }

    Ok(())
}

fn repair_missing_objects(connection: &Connection, db_path: &Path) -> ClientResult<()> {
    // Insert-only: a missing key is restored, a drifted value fails verification.
    for (meta_key, default_value) in REQUIRED_META_KEYS {
        connection
            .execute(
                "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
                params![meta_key, default_value],
            )
            .map_err(|error| map_sqlite_error(db_path, &error))?;
    }

    for index_name in REQUIRED_INDEX_NAMES {
        if !sqlite_object_exists(connection, "index", index_name, db_path)? {
            let sql = index_statement(index_name).ok_or_else(|| {
                ClientError::store_unavailable(db_path, "Missing canonical SQL for index repair.")
            })?;
            debug!(index = index_name, "restoring missing index");
            connection
                .execute_batch(&sql)
                .map_err(|error| map_sqlite_error(db_path, &error))?;
        }
    }

    Ok(())
}

fn verify_store_version(connection: &Connection, db_path: &Path) -> ClientResult<()> {
    let user_version = connection
        .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    if user_version != EXPECTED_USER_VERSION {
        return Err(ClientError::store_corrupt(db_path));
    }

    for (meta_key, expected_value) in REQUIRED_META_KEYS {
        let value = connection
            .query_row(
                "SELECT value FROM meta WHERE key = ?1 LIMIT 1",
                [meta_key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|error| map_sqlite_error(db_path, &error))?;

        match value {
            Some(actual) if actual == expected_value => {}
            _ => return Err(ClientError::store_corrupt(db_path)),
        }
    }

    Ok(())
}

fn sqlite_object_exists(
    connection: &Connection,
    object_type: &str,
    object_name: &str,
    db_path: &Path,
) -> ClientResult<bool> {
    let exists = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2 LIMIT 1",
            params![object_type, object_name],
            |_row| Ok(true),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .unwrap_or(false);

    Ok(exists)
}

fn table_columns(
    connection: &Connection,
    table_name: &str,
    db_path: &Path,
) -> ClientResult<Vec<String>> {
    if !REQUIRED_CORE_TABLES
        .iter()
        .any(|(required_name, _)| required_name == &table_name)
    {
        return Err(ClientError::store_unavailable(
            db_path,
            "Refused PRAGMA table inspection for non-core table.",
        ));
    }

    // `table_name` comes from the compile-time allowlist above.
    let sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&sql)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let column_iter = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut columns: Vec<String> = Vec::new();
    for row in column_iter {
        columns.push(row.map_err(|error| map_sqlite_error(db_path, &error))?);
    }

    Ok(columns)
}

fn read_schema_version(connection: &Connection, db_path: &Path) -> ClientResult<String> {
    let value = connection
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version' LIMIT 1",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(value.unwrap_or_else(|| "v1".to_string()))
}

use std::path::Path;

use rusqlite::Connection;

use crate::ClientResult;
use crate::contracts::types::ImportListItem;
use crate::state::map_sqlite_error;

/// Committed imports, newest first.
pub fn list_import_runs(connection: &Connection, db_path: &Path) -> ClientResult<Vec<ImportListItem>> {
    let mut statement = connection
        .prepare(
            "SELECT
                import_id,
                created_at,
                source_path,
                format,
                rows_read,
                inserted,
                skipped
             FROM import_runs
             ORDER BY created_at DESC, import_id DESC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows_iter = statement
        .query_map([], |row| {
            Ok(ImportListItem {
                import_id: row.get(0)?,
                created_at: row.get(1)?,
                source_path: row.get(2)?,
                format: row.get(3)?,
                rows_read: row.get(4)?,
                inserted: row.get(5)?,
                skipped: row.get(6)?,
            })
        })
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut rows = Vec::new();
    for row in rows_iter {
        rows.push(row.map_err(|error| map_sqlite_error(db_path, &error))?);
    }
    Ok(rows)
}

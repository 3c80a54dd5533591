use std::io;

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use super::format::{self, Column};

pub fn render_import_run(data: &Value) -> io::Result<String> {
    let files = data
        .get("files")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("import output requires files"))?;
    let dry_run = files
        .iter()
        .any(|file| file.get("dry_run").and_then(Value::as_bool).unwrap_or(false));

    let mut lines = vec![
        data.get("message")
            .and_then(Value::as_str)
            .unwrap_or("Import completed.")
            .to_string(),
    ];

    for file in files {
        let Some(report) = file.as_object() else {
            continue;
        };
        lines.push(String::new());
        lines.extend(render_file_report(report));
    }

    lines.push(String::new());
    if dry_run {
        lines.push("No rows were written because this was a dry run.".to_string());
        lines.push(String::new());
        lines.push("Next step:".to_string());
        lines.push("  Run the same command without --dry-run to import.".to_string());
    } else {
        lines.push("Next step:".to_string());
        lines.push("  solde account list".to_string());
    }

    Ok(lines.join("\n"))
}

fn render_file_report(report: &Map<String, Value>) -> Vec<String> {
    let source_path = get_str(report, "source_path");
    let file_format = get_str(report, "format");
    let mut lines = vec![format!("{source_path} ({file_format}):")];

    let mut entries = Vec::new();
    if let Some(import_id) = report.get("import_id").and_then(Value::as_str) {
        entries.push(("Import ID:", import_id.to_string()));
    }
    entries.push(("Rows read:", get_i64(report, "rows_read").to_string()));
    entries.push(("Inserted:", get_i64(report, "inserted").to_string()));
    entries.push(("Skipped:", get_i64(report, "skipped").to_string()));
    let accounts = report
        .get("accounts")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<&str>>()
                .join(", ")
        })
        .unwrap_or_default();
    entries.push(("Accounts:", accounts));
    let balances = get_i64(report, "statement_balances_recorded");
    if balances > 0 {
        entries.push(("Statement balances:", balances.to_string()));
    }
    lines.extend(format::key_value_rows(&entries, 2));

    let new_rows = report
        .get("new_rows_preview")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if !new_rows.is_empty() {
        lines.push(String::new());
        lines.push(preview_heading(
            "New rows",
            new_rows.len(),
            get_i64(report, "inserted"),
        ));
        let table_rows = new_rows
            .iter()
            .map(transaction_cells)
            .collect::<Vec<Vec<String>>>();
        lines.extend(format::render_table_or_blocks(
            &transaction_columns(),
            &table_rows,
            format::terminal_width(),
            "Row",
        ));
    }

    let duplicates = report
        .get("duplicates_preview")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if !duplicates.is_empty() {
        let summary = report
            .get("duplicate_summary")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        lines.push(String::new());
        lines.push(preview_heading(
            "Duplicates",
            duplicates.len(),
            get_i64(&summary, "total"),
        ));
        for row in &duplicates {
            lines.push(render_duplicate_row(row));
        }
    }

    lines
}

fn preview_heading(label: &str, shown: usize, total: i64) -> String {
    if i64::try_from(shown).unwrap_or(i64::MAX) < total {
        format!("  {label} (first {shown} of {total}):")
    } else {
        format!("  {label}:")
    }
}

fn transaction_columns() -> [Column<'static>; 4] {
    [
        Column::left("Date"),
        Column::left("Account"),
        Column::right("Amount"),
        Column::left("Description"),
    ]
}

fn transaction_cells(row: &Value) -> Vec<String> {
    vec![
        row_str(row, "posted_date"),
        row_str(row, "account_id"),
        format::money(row.get("amount_cents").and_then(Value::as_i64).unwrap_or(0)),
        row_str(row, "description"),
    ]
}

fn render_duplicate_row(row: &Value) -> String {
    let source_row = row.get("source_row").and_then(Value::as_i64).unwrap_or(0);
    let reason = match row.get("reason").and_then(Value::as_str) {
        Some("batch") => "repeated in this file",
        Some("existing_store") => "already in store",
        _ => "duplicate",
    };
    let matched_on = match row.get("matched_on").and_then(Value::as_str) {
        Some("source_ref") => "bank id",
        _ => "fingerprint",
    };
    let transaction = row.get("transaction").cloned().unwrap_or(Value::Null);
    let cells = transaction_cells(&transaction);
    format!(
        "  Row {source_row}: {} | {} | {} | {} ({reason}, by {matched_on})",
        cells[0], cells[1], cells[2], cells[3]
    )
}

pub fn render_import_list(data: &Value) -> io::Result<String> {
    let rows = data
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("import list output requires rows"))?;

    if rows.is_empty() {
        return Ok([
            "No imports found yet.",
            "",
            "Run your first import:",
            "  1. solde import create --help",
            "  2. solde import create --dry-run <path>",
            "  3. solde import create <path>",
        ]
        .join("\n"));
    }

    let count_label = if rows.len() == 1 {
        "1 import found.".to_string()
    } else {
        format!("{} imports found.", rows.len())
    };

    let columns = [
        Column::left("Import ID"),
        Column::left("Created (local)"),
        Column::left("Format"),
        Column::right("Rows"),
        Column::right("Inserted"),
        Column::right("Skipped"),
        Column::left("Source"),
    ];
    let table_rows = rows
        .iter()
        .map(|row| {
            vec![
                row_str(row, "import_id"),
                format_created_local(row),
                row_str(row, "format"),
                row_i64(row, "rows_read").to_string(),
                row_i64(row, "inserted").to_string(),
                row_i64(row, "skipped").to_string(),
                row_str(row, "source_path"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![count_label, String::new(), "Imports:".to_string()];
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Import",
    ));
    Ok(lines.join("\n"))
}

fn format_created_local(row: &Value) -> String {
    row.get("created_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|created| {
            created
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn get_i64(map: &Map<String, Value>, key: &str) -> i64 {
    map.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn get_str<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or("unknown")
}

fn row_str(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn row_i64(row: &Value, key: &str) -> i64 {
    row.get(key).and_then(Value::as_i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{render_import_list, render_import_run};

    #[test]
    fn import_run_lists_new_rows_and_duplicates_per_file() {
        let data = json!({
            "message": "Imported 1 new transactions; skipped 1 duplicates.",
            "inserted": 1,
            "skipped": 1,
            "files": [{
                "dry_run": false,
                "import_id": "imp_01",
                "source_path": "acct1.csv",
                "format": "csv",
                "rows_read": 2,
                "inserted": 1,
                "skipped": 1,
                "duplicate_summary": {"total": 1, "batch": 0, "existing_store": 1},
                "accounts": ["acct1"],
                "statement_balances_recorded": 0,
                "new_rows_preview": [{
                    "account_id": "acct1", "posted_date": "2024-01-03",
                    "amount_cents": -4210, "description": "RENT",
                    "source_ref": null, "fingerprint": "ab"
                }],
                "duplicates_preview": [{
                    "source_row": 2, "reason": "existing_store", "matched_on": "fingerprint",
                    "transaction": {
                        "account_id": "acct1", "posted_date": "2024-01-01",
                        "amount_cents": 100000, "description": "SALARY",
                        "source_ref": null, "fingerprint": "cd"
                    }
                }],
                "parse_errors": []
            }]
        });

        let rendered = render_import_run(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("acct1.csv (csv):"));
            assert!(text.contains("Import ID:"));
            assert!(text.contains("-42.10"));
            assert!(text.contains("Row 2: 2024-01-01 | acct1 | 1000.00 | SALARY (already in store, by fingerprint)"));
            assert!(!text.contains("dry run"));
        }
    }

    #[test]
    fn dry_run_says_nothing_was_written() {
        let data = json!({
            "message": "Dry run: 0 new, 0 duplicate. No rows were written.",
            "files": [{
                "dry_run": true, "source_path": "a.ofx", "format": "ofx",
                "rows_read": 0, "inserted": 0, "skipped": 0,
                "accounts": [], "new_rows_preview": [], "duplicates_preview": []
            }]
        });

        let rendered = render_import_run(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("No rows were written because this was a dry run."));
            assert!(!text.contains("Import ID:"));
        }
    }

    #[test]
    fn empty_import_list_points_at_first_import() {
        let rendered = render_import_list(&json!({"rows": []}));
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.starts_with("No imports found yet."));
        }
    }
}

use std::io;

use serde_json::Value;

use super::format::{self, Column};

pub fn render_account_list(data: &Value) -> io::Result<String> {
    let accounts = data
        .get("accounts")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("account list output requires accounts"))?;

    if accounts.is_empty() {
        return Ok([
            "No accounts found yet.",
            "",
            "Import a statement first:",
            "  1. solde import create --help",
            "  2. solde import create --dry-run <path>",
            "  3. solde import create <path>",
        ]
        .join("\n"));
    }

    let rows = accounts
        .iter()
        .map(|account| {
            let latest_statement = account
                .get("latest_statement")
                .filter(|value| !value.is_null())
                .map(|statement| {
                    format!(
                        "{} on {}",
                        cents(statement, "balance_cents"),
                        text(statement, "as_of_date")
                    )
                })
                .unwrap_or_else(|| "-".to_string());
            vec![
                text(account, "account_id"),
                account
                    .get("display_name")
                    .and_then(Value::as_str)
                    .unwrap_or("-")
                    .to_string(),
                account
                    .get("transaction_count")
                    .and_then(Value::as_i64)
                    .unwrap_or(0)
                    .to_string(),
                date_range(account),
                cents(account, "current_balance_cents"),
                latest_statement,
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec!["Accounts:".to_string()];
    lines.extend(format::render_table_or_blocks(
        &[
            Column::left("Account"),
            Column::left("Name"),
            Column::right("Txns"),
            Column::left("Dates"),
            Column::right("Balance"),
            Column::left("Last statement"),
        ],
        &rows,
        format::terminal_width(),
        "Account",
    ));
    Ok(lines.join("\n"))
}

pub fn render_account_update(data: &Value) -> io::Result<String> {
    let message = data
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| io::Error::other("account output requires message"))?;

    let mut lines = vec![message.to_string(), String::new()];
    lines.extend(format::key_value_rows(
        &[
            ("Account:", text(data, "account_id")),
            (
                "Name:",
                data.get("display_name")
                    .and_then(Value::as_str)
                    .unwrap_or("-")
                    .to_string(),
            ),
            ("Opening balance:", cents(data, "opening_balance_cents")),
        ],
        2,
    ));
    Ok(lines.join("\n"))
}

pub fn render_account_check(data: &Value) -> io::Result<String> {
    let checkpoints = data
        .get("checkpoints")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("account check output requires checkpoints"))?;
    let account = text(data, "account_id");

    if checkpoints.is_empty() {
        return Ok([
            format!("No statement balances recorded for {account}."),
            String::new(),
            "Statement balances come from OFX LEDGERBAL blocks, or from a CSV profile".to_string(),
            "with `balance_pattern` set.".to_string(),
        ]
        .join("\n"));
    }

    let rows = checkpoints
        .iter()
        .map(|checkpoint| {
            vec![
                text(checkpoint, "as_of_date"),
                cents(checkpoint, "statement_balance_cents"),
                cents(checkpoint, "ledger_balance_cents"),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![format!("Statement checkpoints for {account}:"), String::new()];
    lines.extend(format::render_table_or_blocks(
        &[
            Column::left("Date"),
            Column::right("Statement"),
            Column::right("Stored"),
        ],
        &rows,
        format::terminal_width(),
        "Checkpoint",
    ));

    lines.push(String::new());
    let mismatches = data
        .get("mismatches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if mismatches.is_empty() {
        lines.push("Stored transactions agree with every statement balance.".to_string());
        return Ok(lines.join("\n"));
    }

    lines.push("Gaps found:".to_string());
    for mismatch in &mismatches {
        lines.push(format!(
            "  {} to {}: bank moved {}, store moved {} (missing {})",
            text(mismatch, "from_date"),
            text(mismatch, "to_date"),
            cents(mismatch, "statement_delta_cents"),
            cents(mismatch, "ledger_delta_cents"),
            cents(mismatch, "missing_cents"),
        ));
    }
    lines.push(String::new());
    lines.push("Import the statements covering these spans, then rerun the check.".to_string());
    Ok(lines.join("\n"))
}

fn date_range(account: &Value) -> String {
    match (
        account.get("first_posted_date").and_then(Value::as_str),
        account.get("last_posted_date").and_then(Value::as_str),
    ) {
        (Some(first), Some(last)) => format!("{first}..{last}"),
        _ => "-".to_string(),
    }
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn cents(value: &Value, key: &str) -> String {
    format::money(value.get(key).and_then(Value::as_i64).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{render_account_check, render_account_list};

    #[test]
    fn list_shows_balance_and_latest_statement() {
        let data = json!({"accounts": [{
            "account_id": "acct1",
            "display_name": null,
            "opening_balance_cents": 0,
            "transaction_count": 3,
            "first_posted_date": "2024-01-01",
            "last_posted_date": "2024-01-03",
            "current_balance_cents": 95790,
            "latest_statement": {"as_of_date": "2024-01-31", "balance_cents": 95790}
        }]});

        let rendered = render_account_list(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("2024-01-01..2024-01-03"));
            assert!(text.contains("957.90 on 2024-01-31"));
        }
    }

    #[test]
    fn check_lists_gaps() {
        let data = json!({
            "account_id": "acct1",
            "healthy": false,
            "checkpoints": [
                {"as_of_date": "2024-01-31", "statement_balance_cents": 1000, "ledger_balance_cents": 1000},
                {"as_of_date": "2024-02-29", "statement_balance_cents": 500, "ledger_balance_cents": 800}
            ],
            "mismatches": [{
                "from_date": "2024-01-31", "to_date": "2024-02-29",
                "statement_delta_cents": -500, "ledger_delta_cents": -200, "missing_cents": -300
            }]
        });

        let rendered = render_account_check(&data);
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.contains("Gaps found:"));
            assert!(text.contains("2024-01-31 to 2024-02-29: bank moved -5.00, store moved -2.00 (missing -3.00)"));
        }
    }
}

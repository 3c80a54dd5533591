//! OFX statements, SGML (1.x) or XML (2.x).
//!
//! Both dialects are read with one tag scanner: SGML leaf elements have no
//! closing tag, so a leaf's value is the text between its open tag and the
//! next `<`. Aggregates (`STMTTRN`, `LEDGERBAL`, ...) are closed in both.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::contracts::types::ImportIssue;
use crate::import::{ParsedRecord, ParsedStatement, StatementBalance};
use crate::money::parse_amount_cents;
use crate::{ClientError, ClientResult};

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Open { name: String, value: Option<&'a str> },
    Close(String),
}

#[derive(Debug, Default)]
struct PendingTransaction {
    ordinal: i64,
    posted: Option<String>,
    amount: Option<String>,
    fitid: Option<String>,
    memo: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default)]
struct PendingBalance {
    amount: Option<String>,
    as_of: Option<String>,
}

pub(crate) fn parse(text: &str, account_override: Option<&str>) -> ClientResult<ParsedStatement> {
    if !text.to_ascii_uppercase().contains("<BANKTRANLIST>") {
        return Err(ClientError::malformed_input(
            "OFX file has no <BANKTRANLIST> transaction list.",
        ));
    }

    let mut statement = ParsedStatement::default();
    let mut issues: Vec<ImportIssue> = Vec::new();
    let mut account: Option<String> = None;
    let mut transaction: Option<PendingTransaction> = None;
    let mut balance: Option<PendingBalance> = None;
    let mut ordinal = 0_i64;
    let mut list_closed = false;

    for token in tokenize(text) {
        match token {
            Token::Open { name, value } => match (name.as_str(), value) {
                ("STMTRS" | "CCSTMTRS", _) => account = None,
                ("STMTTRN", _) => {
                    if let Some(open) = transaction.take() {
                        issues.push(unterminated(open.ordinal));
                    }
                    ordinal += 1;
                    transaction = Some(PendingTransaction {
                        ordinal,
                        ..PendingTransaction::default()
                    });
                }
                ("LEDGERBAL", _) => balance = Some(PendingBalance::default()),
                (field, Some(raw)) => {
                    let value = decode_entities(raw);
                    if let Some(pending) = transaction.as_mut() {
                        match field {
                            "DTPOSTED" => pending.posted = Some(value),
                            "TRNAMT" => pending.amount = Some(value),
                            "FITID" => pending.fitid = Some(value),
                            "MEMO" => pending.memo = Some(value),
                            "NAME" => pending.name = Some(value),
                            _ => {}
                        }
                    } else if let Some(pending) = balance.as_mut() {
                        match field {
                            "BALAMT" => pending.amount = Some(value),
                            "DTASOF" => pending.as_of = Some(value),
                            _ => {}
                        }
                    } else if field == "ACCTID" {
                        account = Some(value);
                    }
                }
                _ => {}
            },
            Token::Close(name) => match name.as_str() {
                "STMTTRN" => {
                    if let Some(pending) = transaction.take() {
                        let account_id = account_override.map(str::to_string).or_else(|| account.clone());
                        match finish_transaction(pending, account_id) {
                            Ok(record) => statement.records.push(record),
                            Err(mut found) => issues.append(&mut found),
                        }
                    }
                }
                "LEDGERBAL" => {
                    if let Some(pending) = balance.take() {
                        let account_id = account_override.map(str::to_string).or_else(|| account.clone());
                        if let Some(found) = finish_balance(pending, account_id) {
                            statement.balances.push(found);
                        }
                    }
                }
                "BANKTRANLIST" => list_closed = true,
                _ => {}
            },
        }
    }

    if let Some(open) = transaction.take() {
        issues.push(unterminated(open.ordinal));
    }
    if !issues.is_empty() {
        return Err(ClientError::import_parse_failed(ordinal, issues));
    }
    if !list_closed {
        return Err(ClientError::malformed_input(
            "OFX file ends before </BANKTRANLIST>; the export looks truncated.",
        ));
    }

    debug!(
        transactions = statement.records.len(),
        balances = statement.balances.len(),
        "parsed OFX statement"
    );
    Ok(statement)
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        let after_open = &rest[start + 1..];
        let Some(end) = after_open.find('>') else {
            break;
        };
        let tag = after_open[..end].trim();
        let body = &after_open[end + 1..];
        let value_end = body.find('<').unwrap_or(body.len());
        let value = body[..value_end].trim();
        rest = &body[value_end..];

        if tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }
        if let Some(name) = tag.strip_prefix('/') {
            tokens.push(Token::Close(name.trim().to_ascii_uppercase()));
            continue;
        }

        let name = tag
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        tokens.push(Token::Open {
            name,
            value: if value.is_empty() { None } else { Some(value) },
        });
    }

    tokens
}

fn finish_transaction(
    pending: PendingTransaction,
    account_id: Option<String>,
) -> Result<ParsedRecord, Vec<ImportIssue>> {
    let row = pending.ordinal;
    let mut issues = Vec::new();

    if account_id.is_none() {
        issues.push(issue(
            row,
            "ACCTID",
            "missing_account",
            "transaction is not inside a statement with an <ACCTID>.".to_string(),
            None,
        ));
    }

    let posted_date = match pending.posted.as_deref() {
        Some(raw) => {
            let parsed = parse_ofx_date(raw);
            if parsed.is_none() {
                issues.push(ImportIssue {
                    expected: Some("YYYYMMDD[HHMMSS...]".to_string()),
                    ..issue(
                        row,
                        "DTPOSTED",
                        "invalid_date",
                        "DTPOSTED must start with a YYYYMMDD date.".to_string(),
                        Some(raw),
                    )
                });
            }
            parsed
        }
        None => {
            issues.push(issue(
                row,
                "DTPOSTED",
                "missing_date",
                "transaction has no DTPOSTED.".to_string(),
                None,
            ));
            None
        }
    };

    let raw_amount = pending.amount.as_deref().unwrap_or_default();
    let amount_cents = match parse_amount_cents(raw_amount) {
        Ok(value) => Some(value),
        Err(error) => {
            issues.push(issue(
                row,
                "TRNAMT",
                error.code(),
                error.describe().to_string(),
                Some(raw_amount),
            ));
            None
        }
    };

    match (account_id, posted_date, amount_cents) {
        (Some(account_id), Some(posted_date), Some(amount_cents)) if issues.is_empty() => {
            let description = pending
                .memo
                .filter(|value| !value.is_empty())
                .or(pending.name)
                .unwrap_or_default();
            Ok(ParsedRecord {
                account_id,
                posted_date,
                amount_cents,
                description,
                source_ref: pending.fitid.filter(|value| !value.is_empty()),
                source_row: row,
            })
        }
        _ => Err(issues),
    }
}

fn unterminated(row: i64) -> ImportIssue {
    issue(
        row,
        "STMTTRN",
        "unterminated_transaction",
        "<STMTTRN> is not closed before the next transaction or the end of the file.".to_string(),
        None,
    )
}

fn finish_balance(pending: PendingBalance, account_id: Option<String>) -> Option<StatementBalance> {
    let account_id = account_id?;
    let as_of_date = pending.as_of.as_deref().and_then(parse_ofx_date);
    let balance_cents = pending
        .amount
        .as_deref()
        .and_then(|raw| parse_amount_cents(raw).ok());

    match (as_of_date, balance_cents) {
        (Some(as_of_date), Some(balance_cents)) => Some(StatementBalance {
            account_id,
            as_of_date,
            balance_cents,
        }),
        _ => {
            warn!(
                account_id = %account_id,
                amount = ?pending.amount,
                as_of = ?pending.as_of,
                "ignoring unreadable LEDGERBAL"
            );
            None
        }
    }
}

fn parse_ofx_date(raw: &str) -> Option<NaiveDate> {
    let digits = raw.get(..8)?;
    if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let Some(end) = candidate.find(';') else {
            decoded.push_str(candidate);
            rest = "";
            break;
        };
        let entity = &candidate[1..end];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix('#')
                .and_then(|code| match code.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => code.parse::<u32>().ok(),
                })
                .and_then(char::from_u32),
        };
        match replacement {
            Some(value) => {
                decoded.push(value);
                rest = &candidate[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = &candidate[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn issue(
    row: i64,
    field: &str,
    code: &str,
    description: String,
    received: Option<&str>,
) -> ImportIssue {
    ImportIssue {
        row,
        field: field.to_string(),
        code: code.to_string(),
        description,
        expected: None,
        received: received.map(str::to_string),
    }
}

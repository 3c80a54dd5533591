//! Bank CSV exports described by a [`ColumnMapping`].

use std::collections::BTreeSet;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contracts::types::ImportIssue;
use crate::import::{ParsedRecord, ParsedStatement, StatementBalance};
use crate::money::{AmountError, parse_amount_cents};
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnMapping {
    #[serde(default)]
    pub account_id: Option<String>,
    pub date_column: String,
    /// Signed amounts in one column. Mutually exclusive with the split
    /// debit/credit columns.
    #[serde(default)]
    pub amount_column: Option<String>,
    #[serde(default)]
    pub debit_column: Option<String>,
    #[serde(default)]
    pub credit_column: Option<String>,
    pub description_column: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Regex with `date` and `amount` named groups, matched against lines
    /// above the header to pick up a statement balance.
    #[serde(default)]
    pub balance_pattern: Option<String>,
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, Copy)]
enum AmountColumns {
    Signed(usize),
    Split { debit: usize, credit: usize },
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndexes {
    date: usize,
    description: usize,
    amount: AmountColumns,
}

impl ColumnMapping {
    pub fn new(date_column: &str, amount_column: &str, description_column: &str) -> Self {
        Self {
            account_id: None,
            date_column: date_column.to_string(),
            amount_column: Some(amount_column.to_string()),
            debit_column: None,
            credit_column: None,
            description_column: description_column.to_string(),
            date_format: default_date_format(),
            delimiter: default_delimiter(),
            balance_pattern: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match (&self.amount_column, &self.debit_column, &self.credit_column) {
            (Some(_), None, None) | (None, Some(_), Some(_)) => {}
            (Some(_), _, _) => {
                return Err(
                    "`amount_column` cannot be combined with `debit_column`/`credit_column`."
                        .to_string(),
                );
            }
            _ => {
                return Err(
                    "set either `amount_column` or both `debit_column` and `credit_column`."
                        .to_string(),
                );
            }
        }
        if !self.delimiter.is_ascii() {
            return Err("`delimiter` must be a single ASCII character.".to_string());
        }
        if self.date_format.trim().is_empty() {
            return Err("`date_format` must not be empty.".to_string());
        }
        if let Some(pattern) = &self.balance_pattern {
            let regex = Regex::new(pattern).map_err(|error| format!("`balance_pattern`: {error}"))?;
            let names = regex.capture_names().flatten().collect::<BTreeSet<&str>>();
            if !names.contains("date") || !names.contains("amount") {
                return Err(
                    "`balance_pattern` needs named groups `date` and `amount`.".to_string(),
                );
            }
        }
        Ok(())
    }

    fn required_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.date_column.as_str()];
        for column in [&self.amount_column, &self.debit_column, &self.credit_column]
            .into_iter()
            .flatten()
        {
            columns.push(column.as_str());
        }
        columns.push(self.description_column.as_str());
        columns
    }

    fn locate(&self, header: &StringRecord) -> Option<ColumnIndexes> {
        let position = |name: &str| header.iter().position(|field| field.trim() == name);
        let amount = match (&self.amount_column, &self.debit_column, &self.credit_column) {
            (Some(amount), _, _) => AmountColumns::Signed(position(amount)?),
            (None, Some(debit), Some(credit)) => AmountColumns::Split {
                debit: position(debit)?,
                credit: position(credit)?,
            },
            _ => return None,
        };
        Some(ColumnIndexes {
            date: position(&self.date_column)?,
            description: position(&self.description_column)?,
            amount,
        })
    }
}

pub(crate) fn parse(
    text: &str,
    mapping: &ColumnMapping,
    account_id: &str,
) -> ClientResult<ParsedStatement> {
    mapping
        .validate()
        .map_err(|detail| ClientError::invalid_argument(&format!("Invalid CSV mapping: {detail}")))?;
    let balance_regex = match &mapping.balance_pattern {
        Some(pattern) => Some(Regex::new(pattern).map_err(|error| {
            ClientError::invalid_argument(&format!("Invalid CSV mapping: {error}"))
        })?),
        None => None,
    };

    let delimiter = u8::try_from(mapping.delimiter).map_err(|_| {
        ClientError::invalid_argument("Invalid CSV mapping: delimiter must be ASCII.")
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut statement = ParsedStatement::default();
    let mut issues: Vec<ImportIssue> = Vec::new();
    let mut columns: Option<ColumnIndexes> = None;
    let mut seen_names: BTreeSet<String> = BTreeSet::new();
    let mut rows_read = 0_i64;

    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|error| {
            ClientError::malformed_input(&format!("CSV could not be read: {error}"))
        })?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let line = record
            .position()
            .map(|position| position.line() as i64)
            .unwrap_or(index as i64 + 1);

        let Some(indexes) = columns else {
            if let Some(found) = mapping.locate(&record) {
                debug!(line, "found CSV header row");
                columns = Some(found);
                continue;
            }
            seen_names.extend(record.iter().map(|field| field.trim().to_string()));
            if let Some(regex) = &balance_regex
                && let Some(balance) = match_balance(regex, &record, mapping, account_id)
            {
                statement.balances.push(balance);
            }
            continue;
        };

        rows_read += 1;
        match parse_row(&record, line, indexes, mapping, account_id) {
            Ok(parsed) => statement.records.push(parsed),
            Err(mut found) => issues.append(&mut found),
        }
    }

    if columns.is_none() {
        let expected = mapping
            .required_columns()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<String>>();
        let missing = expected
            .iter()
            .filter(|name| !seen_names.contains(*name))
            .cloned()
            .collect::<Vec<String>>();
        return Err(ClientError::missing_columns(missing, expected));
    }
    if !issues.is_empty() {
        return Err(ClientError::import_parse_failed(rows_read, issues));
    }

    debug!(
        rows = statement.records.len(),
        balances = statement.balances.len(),
        "parsed CSV export"
    );
    Ok(statement)
}

fn parse_row(
    record: &StringRecord,
    line: i64,
    indexes: ColumnIndexes,
    mapping: &ColumnMapping,
    account_id: &str,
) -> Result<ParsedRecord, Vec<ImportIssue>> {
    let mut issues = Vec::new();
    let field = |index: usize| record.get(index).map(str::trim);

    let posted_date = match field(indexes.date) {
        None | Some("") => {
            issues.push(issue(
                line,
                &mapping.date_column,
                "missing_date",
                "date must be present and non-empty.".to_string(),
                None,
            ));
            None
        }
        Some(raw) => match NaiveDate::parse_from_str(raw, &mapping.date_format) {
            Ok(date) => Some(date),
            Err(_) => {
                issues.push(ImportIssue {
                    expected: Some(mapping.date_format.clone()),
                    ..issue(
                        line,
                        &mapping.date_column,
                        "invalid_date",
                        format!("date does not match format `{}`.", mapping.date_format),
                        Some(raw),
                    )
                });
                None
            }
        },
    };

    let amount_cents = match indexes.amount {
        AmountColumns::Signed(index) => {
            let column = mapping.amount_column.as_deref().unwrap_or_default();
            amount_field(field(index), column, line, &mut issues)
        }
        AmountColumns::Split { debit, credit } => {
            let debit_column = mapping.debit_column.as_deref().unwrap_or_default();
            let credit_column = mapping.credit_column.as_deref().unwrap_or_default();
            let debit_raw = field(debit).unwrap_or_default();
            let credit_raw = field(credit).unwrap_or_default();
            if debit_raw.is_empty() && credit_raw.is_empty() {
                issues.push(issue(
                    line,
                    &format!("{debit_column}/{credit_column}"),
                    AmountError::Empty.code(),
                    "either the debit or the credit column must hold an amount.".to_string(),
                    None,
                ));
                None
            } else {
                let debit_cents = optional_amount(debit_raw, debit_column, line, &mut issues);
                let credit_cents = optional_amount(credit_raw, credit_column, line, &mut issues);
                match (debit_cents, credit_cents) {
                    (Some(debit), Some(credit)) => credit.abs().checked_sub(debit.abs()),
                    _ => None,
                }
            }
        }
    };

    let description = field(indexes.description).unwrap_or_default().to_string();

    match (posted_date, amount_cents) {
        (Some(posted_date), Some(amount_cents)) if issues.is_empty() => Ok(ParsedRecord {
            account_id: account_id.to_string(),
            posted_date,
            amount_cents,
            description,
            source_ref: None,
            source_row: line,
        }),
        _ => Err(issues),
    }
}

fn amount_field(
    raw: Option<&str>,
    column: &str,
    line: i64,
    issues: &mut Vec<ImportIssue>,
) -> Option<i64> {
    let raw = raw.unwrap_or_default();
    match parse_amount_cents(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            issues.push(issue(
                line,
                column,
                error.code(),
                error.describe().to_string(),
                Some(raw),
            ));
            None
        }
    }
}

/// An empty debit or credit cell counts as zero.
fn optional_amount(raw: &str, column: &str, line: i64, issues: &mut Vec<ImportIssue>) -> Option<i64> {
    if raw.is_empty() {
        return Some(0);
    }
    amount_field(Some(raw), column, line, issues)
}

fn match_balance(
    regex: &Regex,
    record: &StringRecord,
    mapping: &ColumnMapping,
    account_id: &str,
) -> Option<StatementBalance> {
    let line = record.iter().collect::<Vec<&str>>().join(" ");
    let captures = regex.captures(&line)?;
    let raw_date = captures.name("date")?.as_str().trim();
    let raw_amount = captures.name("amount")?.as_str().trim();

    let as_of_date = NaiveDate::parse_from_str(raw_date, &mapping.date_format).ok();
    let balance_cents = parse_amount_cents(raw_amount).ok();
    match (as_of_date, balance_cents) {
        (Some(as_of_date), Some(balance_cents)) => Some(StatementBalance {
            account_id: account_id.to_string(),
            as_of_date,
            balance_cents,
        }),
        _ => {
            warn!(raw_date, raw_amount, "ignoring unreadable statement balance line");
            None
        }
    }
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

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ColumnMapping, parse};

    fn bank_profile() -> ColumnMapping {
        ColumnMapping {
            account_id: Some("FR76".to_string()),
            date_column: "Date".to_string(),
            amount_column: None,
            debit_column: Some("Débit euros".to_string()),
            credit_column: Some("Crédit euros".to_string()),
            description_column: "Libellé".to_string(),
            date_format: "%d/%m/%Y".to_string(),
            delimiter: ';',
            balance_pattern: Some(
                r"Solde au (?P<date>\d{2}/\d{2}/\d{4})\s+(?P<amount>[\d\s\u{a0}]*\d+,\d\d)".to_string(),
            ),
        }
    }

    const BANK_EXPORT: &str = "Téléchargement du 03/02/2024;\n\
\n\
Solde au 31/01/2024 1 234,56 €;\n\
\n\
Date;Libellé;Débit euros;Crédit euros;\n\
05/01/2024;\"CARTE X1234 MONOPRIX\";12,50;;\n\
10/01/2024;VIR SALAIRE;;1 500,00;\n\
\n\
  \n";

    #[test]
    fn reads_split_columns_after_preamble() {
        let parsed = parse(BANK_EXPORT, &bank_profile(), "FR76");
        assert!(parsed.is_ok());
        if let Ok(statement) = parsed {
            assert_eq!(statement.records.len(), 2);
            assert_eq!(statement.records[0].amount_cents, -1250);
            assert_eq!(statement.records[0].description, "CARTE X1234 MONOPRIX");
            assert_eq!(statement.records[0].source_row, 6);
            assert_eq!(statement.records[1].amount_cents, 150_000);
            assert_eq!(
                statement.records[1].posted_date,
                NaiveDate::from_ymd_opt(2024, 1, 10).unwrap_or_default()
            );
            assert_eq!(statement.balances.len(), 1);
            assert_eq!(statement.balances[0].balance_cents, 123_456);
        }
    }

    #[test]
    fn reports_every_bad_row_with_line_numbers() {
        let text = "date,amount,memo\n\
2024-01-01,1.00,ok\n\
2024-01-02,1.2.3,bad amount\n\
2024-13-01,2.00,bad date\n\
2024-01-04,,empty amount\n";
        let parsed = parse(text, &ColumnMapping::new("date", "amount", "memo"), "acct");
        assert!(parsed.is_err());
        if let Err(error) = parsed {
            assert_eq!(error.code, "import_parse_failed");
            let data = error.data.unwrap_or_default();
            assert_eq!(data["rows_read"], 4);
            assert_eq!(data["rows_invalid"], 3);
            assert_eq!(data["issues"][0]["row"], 3);
            assert_eq!(data["issues"][0]["field"], "amount");
            assert_eq!(data["issues"][0]["code"], "ambiguous_amount");
            assert_eq!(data["issues"][1]["row"], 4);
            assert_eq!(data["issues"][1]["field"], "date");
            assert_eq!(data["issues"][2]["row"], 5);
            assert_eq!(data["issues"][2]["code"], "missing_amount");
        }
    }

    #[test]
    fn missing_header_names_the_absent_columns() {
        let text = "date,value,memo\n2024-01-01,1.00,x\n";
        let parsed = parse(text, &ColumnMapping::new("date", "amount", "memo"), "acct");
        assert!(parsed.is_err());
        if let Err(error) = parsed {
            assert_eq!(error.code, "malformed_input");
            let data = error.data.unwrap_or_default();
            assert_eq!(data["missing_columns"], serde_json::json!(["amount"]));
        }
    }

    #[test]
    fn header_only_file_parses_to_nothing() {
        let parsed = parse("date,amount,memo\n\n", &ColumnMapping::new("date", "amount", "memo"), "acct");
        assert!(parsed.is_ok_and(|statement| statement.records.is_empty()));
    }

    #[test]
    fn mapping_validation_requires_one_amount_shape() {
        let mut mapping = ColumnMapping::new("d", "a", "m");
        assert!(mapping.validate().is_ok());
        mapping.debit_column = Some("debit".to_string());
        assert!(mapping.validate().is_err());
        mapping.amount_column = None;
        assert!(mapping.validate().is_err());
        mapping.credit_column = Some("credit".to_string());
        assert!(mapping.validate().is_ok());
        mapping.balance_pattern = Some("(?P<date>x)".to_string());
        assert!(mapping.validate().is_err());
    }
}

use std::path::Path;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::contracts::types::ImportIssue;

pub(crate) const IMPORT_HELP_COMMAND: &str = "solde import create --help";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad file content. Nothing from the file was applied.
    MalformedInput,
    /// The requested account is not registered in the store.
    NotFound,
    /// The store could not be opened, migrated, locked, or written.
    StoreUnavailable,
    InvalidArgument,
    Internal,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
    pub data: Option<Value>,
}

impl ClientError {
    pub fn new(kind: ErrorKind, code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            kind,
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_store_error(&self) -> bool {
        matches!(self.kind, ErrorKind::StoreUnavailable | ErrorKind::Internal)
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::invalid_argument_for_command(message, None)
    }

    pub fn invalid_argument_for_command(message: &str, command: Option<&str>) -> Self {
        let help_hint = match command {
            Some(cmd) => format!("Run `solde {cmd} --help` for usage."),
            None => "Run `solde --help` for usage.".to_string(),
        };
        let error = Self::new(
            ErrorKind::InvalidArgument,
            "invalid_argument",
            message,
            vec![help_hint],
        );
        if let Some(cmd) = command {
            return error.with_data(json!({
                "command_hint": cmd,
            }));
        }
        error
    }

    pub fn invalid_argument_with_recovery(message: &str, recovery_steps: Vec<String>) -> Self {
        Self::new(
            ErrorKind::InvalidArgument,
            "invalid_argument",
            message,
            recovery_steps,
        )
    }

    pub fn config_invalid(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::InvalidArgument,
            "config_invalid",
            &format!("Configuration at `{location}` is invalid: {detail}"),
            vec![format!(
                "Fix `{location}` or remove it to fall back to built-in defaults."
            )],
        )
    }

    pub fn malformed_input(message: &str) -> Self {
        Self::new(
            ErrorKind::MalformedInput,
            "malformed_input",
            message,
            vec![
                "Check that the file is an untouched bank export in the declared format."
                    .to_string(),
                format!("Run `{IMPORT_HELP_COMMAND}` to review supported formats."),
            ],
        )
    }

    pub fn unsupported_format(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::malformed_input(&format!(
            "Cannot infer the export format of `{location}`. Use a .ofx, .qfx, or .csv file, or pass --format."
        ))
        .with_data(json!({
            "path": location,
            "supported_formats": ["ofx", "csv"],
        }))
    }

    pub fn missing_columns(missing: Vec<String>, expected: Vec<String>) -> Self {
        Self::new(
            ErrorKind::MalformedInput,
            "malformed_input",
            &format!(
                "CSV header row with the mapped columns was not found; missing: {}.",
                missing.join(", ")
            ),
            vec![
                "Check the column names of the CSV profile against the file's header row."
                    .to_string(),
                "Column names are matched exactly after trimming whitespace.".to_string(),
            ],
        )
        .with_data(json!({
            "missing_columns": missing,
            "expected_columns": expected,
        }))
    }

    pub fn import_parse_failed(rows_read: i64, issues: Vec<ImportIssue>) -> Self {
        let rows_invalid = issues
            .iter()
            .map(|issue| issue.row)
            .collect::<std::collections::BTreeSet<i64>>()
            .len();
        Self::new(
            ErrorKind::MalformedInput,
            "import_parse_failed",
            &format!(
                "Import rejected: {rows_invalid} of {rows_read} rows could not be parsed. No rows were written."
            ),
            vec![
                "Fix the listed rows in the source file, or correct the CSV profile.".to_string(),
                "Rerun `solde import create --dry-run <path>`.".to_string(),
            ],
        )
        .with_data(json!({
            "rows_read": rows_read,
            "rows_invalid": rows_invalid,
            "issues": issues,
        }))
    }

    pub fn account_not_found(account_id: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            "account_not_found",
            &format!("Account `{account_id}` was not found."),
            vec![
                "Run `solde account list` to see known accounts.".to_string(),
                "Accounts are registered by importing a file or with `solde account add`."
                    .to_string(),
            ],
        )
        .with_data(json!({
            "account_id": account_id,
        }))
    }

    pub fn internal_serialization(message: &str) -> Self {
        Self::new(
            ErrorKind::Internal,
            "internal_serialization_error",
            message,
            Vec::new(),
        )
    }

    pub fn store_init_permission_denied(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::StoreUnavailable,
            "store_init_permission_denied",
            &format!("Cannot open the store at `{location}`: {detail}"),
            vec![format!(
                "Grant write access to `{location}` or set `SOLDE_HOME` to a writable directory."
            )],
        )
    }

    pub fn store_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::StoreUnavailable,
            "store_locked",
            &format!("Store database is locked at `{location}`."),
            vec![format!(
                "Close other processes using `{location}`, then retry the whole file."
            )],
        )
    }

    pub fn store_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::StoreUnavailable,
            "store_corrupt",
            &format!("Store database appears corrupt at `{location}`."),
            vec![format!(
                "Replace `{location}` with a valid SQLite store or restore from backup."
            )],
        )
    }

    pub fn migration_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::StoreUnavailable,
            "migration_failed",
            &format!("Store migration failed at `{location}`: {detail}"),
            vec!["Resolve conflicting schema objects referenced in the error details.".to_string()],
        )
    }

    pub fn store_unavailable(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            ErrorKind::StoreUnavailable,
            "store_unavailable",
            &format!("Store operation failed at `{location}`: {detail}"),
            vec!["No partial changes were kept. Retry the command once the store is reachable."
                .to_string()],
        )
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{ClientError, ErrorKind};
    use crate::contracts::types::ImportIssue;

    #[test]
    fn parse_failure_counts_distinct_rows() {
        let issue = |row: i64, field: &str| ImportIssue {
            row,
            field: field.to_string(),
            code: "invalid_amount".to_string(),
            description: "bad".to_string(),
            expected: None,
            received: None,
        };
        let error =
            ClientError::import_parse_failed(10, vec![issue(3, "amount"), issue(3, "date"), issue(7, "amount")]);

        assert_eq!(error.kind, ErrorKind::MalformedInput);
        assert!(error.message.contains("2 of 10 rows"));
        let issues = error
            .data
            .as_ref()
            .and_then(|data| data.get("issues"))
            .and_then(|value| value.as_array())
            .map(Vec::len);
        assert_eq!(issues, Some(3));
    }

    #[test]
    fn store_errors_are_flagged_for_exit_codes() {
        assert!(ClientError::store_locked(Path::new("/tmp/solde.db")).is_store_error());
        assert!(!ClientError::account_not_found("acct").is_store_error());
        assert!(!ClientError::malformed_input("bad").is_store_error());
    }
}

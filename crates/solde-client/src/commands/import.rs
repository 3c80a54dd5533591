use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::commands::common::open_store;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{ImportData, ImportListData, ImportReport};
use crate::import::{self, ImportFormat, ImportRequest, list_import_runs};
use crate::{ClientError, ClientResult};

#[derive(Debug, Default)]
pub struct ImportRunOptions<'a> {
    pub paths: Vec<PathBuf>,
    pub format: Option<String>,
    pub profile: Option<String>,
    pub account: Option<String>,
    pub dry_run: bool,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct ImportListOptions<'a> {
    pub home_override: Option<&'a Path>,
}

pub fn run(paths: Vec<PathBuf>, dry_run: bool) -> ClientResult<SuccessEnvelope> {
    run_with_options(ImportRunOptions {
        paths,
        dry_run,
        ..ImportRunOptions::default()
    })
}

/// Imports each file in order, one transaction per file. A failing file
/// stops the run; files before it stay committed and are named in the
/// error data.
#[doc(hidden)]
pub fn run_with_options(options: ImportRunOptions<'_>) -> ClientResult<SuccessEnvelope> {
    if options.paths.is_empty() {
        return Err(ClientError::invalid_argument_for_command(
            "No import file given.",
            Some("import create"),
        ));
    }

    let format = options
        .format
        .as_deref()
        .map(str::parse::<ImportFormat>)
        .transpose()?;
    let (setup, mut connection) = open_store(options.home_override)?;
    let mapping = setup.settings.csv_profile(options.profile.as_deref())?;

    let mut files: Vec<ImportReport> = Vec::new();
    for path in &options.paths {
        let request = ImportRequest {
            path,
            format,
            mapping,
            account_override: options.account.as_deref(),
            dry_run: options.dry_run,
        };
        match import::import_file(&mut connection, &setup.db_path, &request) {
            Ok(report) => files.push(report),
            Err(error) => return Err(with_completed_files(error, path, &files)),
        }
    }

    let inserted = files.iter().map(|file| file.inserted).sum::<i64>();
    let skipped = files.iter().map(|file| file.skipped).sum::<i64>();
    let message = if options.dry_run {
        format!("Dry run: {inserted} new, {skipped} duplicate. No rows were written.")
    } else {
        format!("Imported {inserted} new transactions; skipped {skipped} duplicates.")
    };

    success(
        "import",
        ImportData {
            message,
            files,
            inserted,
            skipped,
        },
    )
}

pub fn list() -> ClientResult<SuccessEnvelope> {
    list_with_options(ImportListOptions::default())
}

#[doc(hidden)]
pub fn list_with_options(options: ImportListOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let (setup, connection) = open_store(options.home_override)?;
    let rows = list_import_runs(&connection, &setup.db_path)?;
    success("import list", ImportListData { rows })
}

fn with_completed_files(error: ClientError, failed: &Path, completed: &[ImportReport]) -> ClientError {
    let mut data = match error.data.clone() {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("detail".to_string(), other);
            map
        }
        None => serde_json::Map::new(),
    };
    data.insert(
        "failed_path".to_string(),
        json!(failed.display().to_string()),
    );
    if !completed.is_empty() {
        data.insert(
            "completed_imports".to_string(),
            json!(
                completed
                    .iter()
                    .map(|file| json!({
                        "source_path": file.source_path,
                        "import_id": file.import_id,
                        "inserted": file.inserted,
                        "skipped": file.skipped,
                    }))
                    .collect::<Vec<Value>>()
            ),
        );
    }
    error.with_data(Value::Object(data))
}

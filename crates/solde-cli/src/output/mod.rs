mod accounts_text;
mod balance_text;
mod error_text;
mod format;
mod import_text;
mod json;
mod mode;

use std::io;

use solde_client::{ClientError, SuccessEnvelope};

use crate::stdout_io::write_stdout_line;

pub use mode::{OutputMode, mode_for_command};

pub fn print_success(success: &SuccessEnvelope, mode: OutputMode) -> io::Result<()> {
    let body = match mode {
        OutputMode::Text => render_text_success(success)?,
        OutputMode::Json => json::render_success_json(success)?,
    };
    write_stdout_line(&body)
}

pub fn print_failure(error: &ClientError, mode: OutputMode) -> io::Result<()> {
    let body = match mode {
        OutputMode::Json => json::render_error_json(error)?,
        OutputMode::Text => error_text::render_error(error),
    };
    write_stdout_line(&body)
}

fn render_text_success(success: &SuccessEnvelope) -> io::Result<String> {
    match success.command.as_str() {
        "import" => import_text::render_import_run(&success.data),
        "import list" => import_text::render_import_list(&success.data),
        "balance show" => balance_text::render_balance_series(&success.data),
        "balance compare" => balance_text::render_month_comparison(&success.data),
        "balance savings" => balance_text::render_savings(&success.data),
        "account list" => accounts_text::render_account_list(&success.data),
        "account add" | "account opening" => accounts_text::render_account_update(&success.data),
        "account check" => accounts_text::render_account_check(&success.data),
        _ => Err(io::Error::other(format!(
            "unsupported text output command `{}`",
            success.command
        ))),
    }
}

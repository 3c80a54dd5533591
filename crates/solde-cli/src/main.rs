mod cli;
mod dispatch;
mod output;
mod stdout_io;

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use solde_client::ClientError;
use stdout_io::write_stdout_text;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const ROOT_HELP: &str = "solde - bank statement importer and balance history

Usage:
  solde <command>

Start here:
  solde import create --help
  solde account list
  solde balance show <account>
";

const TOP_LEVEL_HELP: &str = "solde - bank statement importer and balance history

USAGE: solde [--home PATH] [-v] <command>

Import statements:
  1. solde import create --help                   Formats, CSV profiles, workflow
  2. solde import create --dry-run <path>...      Parse and dedupe without writing
  3. solde import create <path>...                Import OFX/QFX or CSV files
  solde import list                               List past imports

Look at balances:
  solde balance show <account> [--monthly]        Daily or month-end balance series
  solde balance compare <account> [--months N]    Overlay recent months by day
  solde balance savings <account> [--pay-day N]   Saved between pay days

Accounts:
  solde account list                              Accounts with balances
  solde account add <account> [--name NAME]       Register or rename an account
  solde account opening <account> <amount>        Set the opening balance
  solde account check <account>                   Compare with statement balances

The store lives in $SOLDE_HOME, or ~/.solde. Add --json to any leaf
command for machine-readable output. Logs go to stderr (-v, -vv, or RUST_LOG).
";

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(code) => code,
    }
}

fn run() -> Result<ExitCode, ExitCode> {
    let raw_args = std::env::args().collect::<Vec<String>>();
    if raw_args.len() == 1 {
        if write_stdout_text(ROOT_HELP).is_err() {
            return Err(ExitCode::from(2));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let cli = match cli::Cli::try_parse() {
        Ok(value) => value,
        Err(err) => return handle_parse_error(&err, &raw_args),
    };
    init_tracing(cli.verbose);
    let mode = output::mode_for_command(&cli.command);

    match dispatch::dispatch(&cli) {
        Ok(success) => {
            if output::print_success(&success, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            if output::print_failure(&error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(exit_code_for_error(&error))
        }
    }
}

/// `RUST_LOG` wins over `-v`; without either only warnings are shown.
fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            _ => EnvFilter::new("debug"),
        }
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();
}

fn handle_parse_error(err: &clap::Error, raw_args: &[String]) -> Result<ExitCode, ExitCode> {
    if matches!(
        err.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    ) {
        let text = if is_top_level_help_request(raw_args) {
            TOP_LEVEL_HELP.to_string()
        } else {
            err.to_string()
        };
        if write_stdout_text(&text).is_err() {
            return Err(ExitCode::from(2));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let command_hint = if matches!(
        err.kind(),
        ErrorKind::MissingRequiredArgument
            | ErrorKind::InvalidValue
            | ErrorKind::ValueValidation
            | ErrorKind::WrongNumberOfValues
            | ErrorKind::UnknownArgument
            | ErrorKind::InvalidSubcommand
            | ErrorKind::ArgumentConflict
    ) {
        command_path_from_args(raw_args)
    } else {
        None
    };
    let clean_message = strip_clap_boilerplate(&err.to_string());
    let parse_error = ClientError::invalid_argument_for_command(&clean_message, command_hint);
    let mode = infer_requested_output_mode(raw_args);
    if output::print_failure(&parse_error, mode).is_err() {
        return Err(ExitCode::from(2));
    }
    Err(ExitCode::from(1))
}

fn is_top_level_help_request(raw_args: &[String]) -> bool {
    raw_args.len() == 2 && matches!(raw_args[1].as_str(), "--help" | "-h")
}

/// Strips clap's trailing usage and "For more information" hint so the
/// "What to do next" section is the only guidance shown.
fn strip_clap_boilerplate(message: &str) -> String {
    let trimmed = if let Some(pos) = message.find("\n\nUsage:") {
        &message[..pos]
    } else if let Some(pos) = message.find("\nFor more information") {
        &message[..pos]
    } else {
        message
    };
    trimmed.trim_end().to_string()
}

fn command_path_from_args(raw_args: &[String]) -> Option<&'static str> {
    let words = raw_args
        .iter()
        .skip(1)
        .filter(|value| !value.starts_with('-'))
        .map(String::as_str)
        .collect::<Vec<&str>>();

    // `--home` takes a value; skipping its value keeps the path out of the match.
    let words = match raw_args.iter().position(|value| value == "--home") {
        Some(index) => {
            let home_value = raw_args.get(index + 1).map(String::as_str);
            words
                .into_iter()
                .filter(|word| Some(*word) != home_value)
                .collect::<Vec<&str>>()
        }
        None => words,
    };

    match words.as_slice() {
        ["import", "create", ..] => Some("import create"),
        ["import", "list", ..] => Some("import list"),
        ["import", ..] => Some("import"),
        ["balance", "show", ..] => Some("balance show"),
        ["balance", "compare", ..] => Some("balance compare"),
        ["balance", "savings", ..] => Some("balance savings"),
        ["balance", ..] => Some("balance"),
        ["account", "list", ..] => Some("account list"),
        ["account", "add", ..] => Some("account add"),
        ["account", "opening", ..] => Some("account opening"),
        ["account", "check", ..] => Some("account check"),
        ["account", ..] => Some("account"),
        _ => None,
    }
}

fn infer_requested_output_mode(raw_args: &[String]) -> output::OutputMode {
    if raw_args.iter().skip(1).any(|value| value == "--json") {
        return output::OutputMode::Json;
    }
    output::OutputMode::Text
}

fn exit_code_for_error(error: &ClientError) -> ExitCode {
    if error.is_store_error() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

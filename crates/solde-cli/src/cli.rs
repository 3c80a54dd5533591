use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoDate(pub String);

impl IsoDate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn parse_iso_date(value: &str) -> Result<IsoDate, String> {
    if value.len() != 10 {
        return Err("date must use YYYY-MM-DD format".to_string());
    }

    let bytes = value.as_bytes();
    if bytes[4] != b'-' || bytes[7] != b'-' {
        return Err("date must use YYYY-MM-DD format".to_string());
    }

    for index in [0usize, 1, 2, 3, 5, 6, 8, 9] {
        if !bytes[index].is_ascii_digit() {
            return Err("date must use YYYY-MM-DD format".to_string());
        }
    }

    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        return Err("date must use valid calendar values".to_string());
    }

    Ok(IsoDate(value.to_string()))
}

pub fn parse_import_format(value: &str) -> Result<String, String> {
    match value.to_ascii_lowercase().as_str() {
        "ofx" | "csv" => Ok(value.to_ascii_lowercase()),
        _ => Err("format must be one of: ofx, csv".to_string()),
    }
}

pub fn parse_pay_day(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(day) if (1..=31).contains(&day) => Ok(day),
        _ => Err("pay day must be a number from 1 to 31".to_string()),
    }
}

/// Extended help shown after `solde import create --help`.
pub const IMPORT_CREATE_AFTER_HELP: &str = "\
How import works:
  Each file is parsed completely before anything is written. A file with
  any bad row is rejected as a whole and every problem is listed.
  Rows already in the store, or repeated inside the file, are skipped.

  Accepted formats:
    OFX/QFX - bank statement download, SGML or XML flavour
    CSV     - any bank export, read through a column profile

  The format is taken from the file extension unless --format is given.
  Files named together are imported one after another; each file is
  committed on its own.

CSV profiles live in <home>/config.toml:
  [csv_profiles.mybank]
  account_id = \"checking\"
  date_column = \"Date\"
  amount_column = \"Amount\"          # or debit_column + credit_column
  description_column = \"Label\"
  date_format = \"%d/%m/%Y\"
  delimiter = \";\"
  balance_pattern = 'Balance at (?P<date>\\S+): (?P<amount>\\S+)'

What to do next:
  1. Run `solde import create --dry-run <path>` and fix any reported issues.
  2. Run `solde import create <path>` once the dry run passes.
  3. Run `solde balance show <account>` to see the resulting series.
";

#[derive(Debug, Parser)]
#[command(
    name = "solde",
    version,
    about = "bank statement importer and balance history",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Store directory (defaults to $SOLDE_HOME, then ~/.solde)
    #[arg(long, global = true, value_name = "PATH")]
    pub home: Option<PathBuf>,
    /// Log pipeline stages to stderr (-vv for more detail)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import bank statements and inspect past imports
    #[command(arg_required_else_help = true)]
    Import {
        #[command(subcommand)]
        command: ImportCommand,
    },
    /// Query balance history for one account
    #[command(arg_required_else_help = true)]
    Balance {
        #[command(subcommand)]
        command: BalanceCommand,
    },
    /// List, register, and check accounts
    #[command(arg_required_else_help = true)]
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ImportCommand {
    /// Import one or more OFX or CSV files
    #[command(after_long_help = IMPORT_CREATE_AFTER_HELP)]
    Create {
        /// Files to import, in order
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Force the file format instead of inferring it from the extension
        #[arg(long, value_parser = parse_import_format)]
        format: Option<String>,
        /// CSV column profile from config.toml
        #[arg(long)]
        profile: Option<String>,
        /// Store rows under this account id, whatever the file says
        #[arg(long)]
        account: Option<String>,
        /// Report what would be imported without writing to the store
        #[arg(long)]
        dry_run: bool,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// List past imports, newest first
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum BalanceCommand {
    /// Show the balance series for an account
    Show {
        account: String,
        /// First day of the series (YYYY-MM-DD)
        #[arg(long, value_parser = parse_iso_date)]
        from: Option<IsoDate>,
        /// Last day of the series (YYYY-MM-DD)
        #[arg(long, value_parser = parse_iso_date)]
        to: Option<IsoDate>,
        /// One point per month, at month end
        #[arg(long)]
        monthly: bool,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Overlay recent months by day of month
    Compare {
        account: String,
        /// Number of months before the reference month
        #[arg(long)]
        months: Option<u32>,
        /// Reference date (YYYY-MM-DD); defaults to the last posted date
        #[arg(long, value_parser = parse_iso_date)]
        at: Option<IsoDate>,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Money saved between consecutive pay days
    Savings {
        account: String,
        /// Day of month the salary lands (1-31)
        #[arg(long, value_parser = parse_pay_day)]
        pay_day: Option<u32>,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum AccountCommand {
    /// Show every account with its balance and date range
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Register an account, or rename one
    Add {
        account: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Set the balance the account held before its first transaction
    Opening {
        account: String,
        /// Amount such as `1250.00` or `-40,50`
        #[arg(allow_hyphen_values = true, required_unless_present = "from_statement")]
        amount: Option<String>,
        /// Derive it from the latest imported statement balance
        #[arg(long, conflicts_with = "amount")]
        from_statement: bool,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Compare statement balances with stored transactions
    Check {
        account: String,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}

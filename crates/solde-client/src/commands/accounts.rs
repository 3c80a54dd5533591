use std::path::Path;

use serde::Serialize;

use crate::accounts::{
    AccountRecord, OpeningBalance, list_accounts, register_account, set_opening_balance,
};
use crate::balance::AccountLedger;
use crate::balance::checkpoints::{check as check_checkpoints, load_statement_balances};
use crate::commands::common::open_store;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::AccountListData;
use crate::money::parse_amount_cents;
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Serialize)]
pub struct AccountData {
    pub message: String,
    pub account_id: String,
    pub display_name: Option<String>,
    pub opening_balance_cents: i64,
}

impl AccountData {
    fn from_record(message: String, record: AccountRecord) -> Self {
        Self {
            message,
            account_id: record.account_id,
            display_name: record.display_name,
            opening_balance_cents: record.opening_balance_cents,
        }
    }
}

#[derive(Debug, Default)]
pub struct AccountAddOptions<'a> {
    pub account_id: String,
    pub display_name: Option<String>,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct AccountOpeningOptions<'a> {
    pub account_id: String,
    /// Decimal amount as typed, e.g. `1 250,00` or `-40.5`.
    pub amount: Option<String>,
    pub from_statement: bool,
    pub home_override: Option<&'a Path>,
}

pub fn list() -> ClientResult<SuccessEnvelope> {
    list_with_home_override(None)
}

#[doc(hidden)]
pub fn list_with_home_override(home_override: Option<&Path>) -> ClientResult<SuccessEnvelope> {
    let (setup, connection) = open_store(home_override)?;
    let accounts = list_accounts(&connection, &setup.db_path)?;
    success("account list", AccountListData { accounts })
}

pub fn add(account_id: &str, display_name: Option<&str>) -> ClientResult<SuccessEnvelope> {
    add_with_options(AccountAddOptions {
        account_id: account_id.to_string(),
        display_name: display_name.map(str::to_string),
        home_override: None,
    })
}

#[doc(hidden)]
pub fn add_with_options(options: AccountAddOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let (setup, connection) = open_store(options.home_override)?;
    let record = register_account(
        &connection,
        &setup.db_path,
        &options.account_id,
        options.display_name.as_deref(),
    )?;
    let message = format!("Account `{}` is registered.", record.account_id);
    success("account add", AccountData::from_record(message, record))
}

#[doc(hidden)]
pub fn opening_with_options(options: AccountOpeningOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let opening = match (options.amount.as_deref(), options.from_statement) {
        (Some(_), true) => {
            return Err(ClientError::invalid_argument_for_command(
                "Pass either an amount or --from-statement, not both.",
                Some("account opening"),
            ));
        }
        (None, false) => {
            return Err(ClientError::invalid_argument_for_command(
                "An opening amount or --from-statement is required.",
                Some("account opening"),
            ));
        }
        (None, true) => OpeningBalance::FromLatestStatement,
        (Some(raw), false) => {
            let cents = parse_amount_cents(raw).map_err(|error| {
                ClientError::invalid_argument_for_command(
                    &format!("Invalid opening amount `{raw}`: {}", error.describe()),
                    Some("account opening"),
                )
            })?;
            OpeningBalance::Cents(cents)
        }
    };

    let (setup, connection) = open_store(options.home_override)?;
    let record = set_opening_balance(&connection, &setup.db_path, &options.account_id, opening)?;
    let message = format!(
        "Opening balance of `{}` set to {} cents.",
        record.account_id, record.opening_balance_cents
    );
    success("account opening", AccountData::from_record(message, record))
}

pub fn check(account_id: &str) -> ClientResult<SuccessEnvelope> {
    check_with_home_override(account_id, None)
}

#[doc(hidden)]
pub fn check_with_home_override(
    account_id: &str,
    home_override: Option<&Path>,
) -> ClientResult<SuccessEnvelope> {
    let (setup, connection) = open_store(home_override)?;
    let ledger = AccountLedger::load(&connection, &setup.db_path, account_id)?;
    let statement_balances = load_statement_balances(&connection, &setup.db_path, account_id)?;
    success("account check", check_checkpoints(&ledger, &statement_balances))
}

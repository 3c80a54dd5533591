use std::path::Path;

use chrono::{Local, NaiveDate};

use crate::accounts::require_account;
use crate::balance::comparison::month_comparison;
use crate::balance::savings::monthly_savings;
use crate::balance::{AccountLedger, DateRange, Granularity, extremes};
use crate::commands::common::open_store;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{BalanceSeriesData, SavingsData};
use crate::dates::parse_iso_date_strict;
use crate::{ClientError, ClientResult};

const MAX_COMPARISON_MONTHS: u32 = 120;

#[derive(Debug, Default)]
pub struct BalanceShowOptions<'a> {
    pub account_id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub monthly: bool,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct BalanceCompareOptions<'a> {
    pub account_id: String,
    pub months: Option<u32>,
    pub at: Option<String>,
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct BalanceSavingsOptions<'a> {
    pub account_id: String,
    pub pay_day: Option<u32>,
    pub home_override: Option<&'a Path>,
}

pub fn show(account_id: &str) -> ClientResult<SuccessEnvelope> {
    show_with_options(BalanceShowOptions {
        account_id: account_id.to_string(),
        ..BalanceShowOptions::default()
    })
}

#[doc(hidden)]
pub fn show_with_options(options: BalanceShowOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let from = parse_optional_date(options.from.as_deref(), "from", "balance show")?;
    let to = parse_optional_date(options.to.as_deref(), "to", "balance show")?;
    let granularity = if options.monthly {
        Granularity::Monthly
    } else {
        Granularity::Daily
    };

    let (setup, connection) = open_store(options.home_override)?;
    let account = require_account(&connection, &setup.db_path, &options.account_id)?;
    let ledger = AccountLedger::load(&connection, &setup.db_path, &options.account_id)?;
    let points = ledger.series(DateRange { from, to }, granularity)?;

    success(
        "balance show",
        BalanceSeriesData {
            account_id: account.account_id,
            display_name: account.display_name,
            granularity,
            opening_balance_cents: account.opening_balance_cents,
            from: points.first().map(|point| point.date),
            to: points.last().map(|point| point.date),
            extremes: extremes(&points),
            points,
        },
    )
}

pub fn compare(account_id: &str) -> ClientResult<SuccessEnvelope> {
    compare_with_options(BalanceCompareOptions {
        account_id: account_id.to_string(),
        ..BalanceCompareOptions::default()
    })
}

/// Without `at`, the reference date is the account's last posted date.
#[doc(hidden)]
pub fn compare_with_options(options: BalanceCompareOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let at = parse_optional_date(options.at.as_deref(), "at", "balance compare")?;
    if options.months.is_some_and(|months| months > MAX_COMPARISON_MONTHS) {
        return Err(ClientError::invalid_argument_for_command(
            &format!("--months must be at most {MAX_COMPARISON_MONTHS}."),
            Some("balance compare"),
        ));
    }

    let (setup, connection) = open_store(options.home_override)?;
    let ledger = AccountLedger::load(&connection, &setup.db_path, &options.account_id)?;
    let months = options
        .months
        .unwrap_or(setup.settings.defaults.comparison_months);
    let reference_date = at
        .or_else(|| ledger.last_date())
        .unwrap_or_else(|| Local::now().date_naive());

    success(
        "balance compare",
        month_comparison(&ledger, reference_date, months),
    )
}

pub fn savings(account_id: &str) -> ClientResult<SuccessEnvelope> {
    savings_with_options(BalanceSavingsOptions {
        account_id: account_id.to_string(),
        ..BalanceSavingsOptions::default()
    })
}

#[doc(hidden)]
pub fn savings_with_options(options: BalanceSavingsOptions<'_>) -> ClientResult<SuccessEnvelope> {
    if options.pay_day.is_some_and(|day| !(1..=31).contains(&day)) {
        return Err(ClientError::invalid_argument_for_command(
            "--pay-day must be between 1 and 31.",
            Some("balance savings"),
        ));
    }

    let (setup, connection) = open_store(options.home_override)?;
    let ledger = AccountLedger::load(&connection, &setup.db_path, &options.account_id)?;
    let pay_day = options.pay_day.unwrap_or(setup.settings.defaults.pay_day);
    let periods = monthly_savings(&ledger, pay_day);
    let total_saved_cents = periods
        .iter()
        .fold(0_i64, |total, period| total.saturating_add(period.saved_cents));

    success(
        "balance savings",
        SavingsData {
            account_id: options.account_id,
            pay_day,
            periods,
            total_saved_cents,
        },
    )
}

fn parse_optional_date(
    value: Option<&str>,
    field_name: &str,
    command: &str,
) -> ClientResult<Option<NaiveDate>> {
    value
        .map(|raw| parse_iso_date_strict(raw, field_name, command))
        .transpose()
}

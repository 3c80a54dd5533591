use solde_client::commands;
use solde_client::commands::accounts::{AccountAddOptions, AccountOpeningOptions};
use solde_client::commands::balance::{
    BalanceCompareOptions, BalanceSavingsOptions, BalanceShowOptions,
};
use solde_client::commands::import::{ImportListOptions, ImportRunOptions};
use solde_client::{ClientResult, SuccessEnvelope};

use crate::cli::{AccountCommand, BalanceCommand, Cli, Commands, ImportCommand, IsoDate};

pub fn dispatch(cli: &Cli) -> ClientResult<SuccessEnvelope> {
    let home_override = cli.home.as_deref();
    match &cli.command {
        Commands::Import { command } => match command {
            ImportCommand::Create {
                paths,
                format,
                profile,
                account,
                dry_run,
                json: _,
            } => commands::import::run_with_options(ImportRunOptions {
                paths: paths.clone(),
                format: format.clone(),
                profile: profile.clone(),
                account: account.clone(),
                dry_run: *dry_run,
                home_override,
            }),
            ImportCommand::List { .. } => {
                commands::import::list_with_options(ImportListOptions { home_override })
            }
        },
        Commands::Balance { command } => match command {
            BalanceCommand::Show {
                account,
                from,
                to,
                monthly,
                ..
            } => commands::balance::show_with_options(BalanceShowOptions {
                account_id: account.clone(),
                from: date_string(from.as_ref()),
                to: date_string(to.as_ref()),
                monthly: *monthly,
                home_override,
            }),
            BalanceCommand::Compare {
                account,
                months,
                at,
                ..
            } => commands::balance::compare_with_options(BalanceCompareOptions {
                account_id: account.clone(),
                months: *months,
                at: date_string(at.as_ref()),
                home_override,
            }),
            BalanceCommand::Savings {
                account, pay_day, ..
            } => commands::balance::savings_with_options(BalanceSavingsOptions {
                account_id: account.clone(),
                pay_day: *pay_day,
                home_override,
            }),
        },
        Commands::Account { command } => match command {
            AccountCommand::List { .. } => {
                commands::accounts::list_with_home_override(home_override)
            }
            AccountCommand::Add { account, name, .. } => {
                commands::accounts::add_with_options(AccountAddOptions {
                    account_id: account.clone(),
                    display_name: name.clone(),
                    home_override,
                })
            }
            AccountCommand::Opening {
                account,
                amount,
                from_statement,
                ..
            } => commands::accounts::opening_with_options(AccountOpeningOptions {
                account_id: account.clone(),
                amount: amount.clone(),
                from_statement: *from_statement,
                home_override,
            }),
            AccountCommand::Check { account, .. } => {
                commands::accounts::check_with_home_override(account, home_override)
            }
        },
    }
}

fn date_string(value: Option<&IsoDate>) -> Option<String> {
    value.map(|date| date.as_str().to_string())
}

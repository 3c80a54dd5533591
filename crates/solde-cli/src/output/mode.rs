use crate::cli::{AccountCommand, BalanceCommand, Commands, ImportCommand};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    const fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

pub fn mode_for_command(command: &Commands) -> OutputMode {
    let json = match command {
        Commands::Import { command } => match command {
            ImportCommand::Create { json, .. } | ImportCommand::List { json } => *json,
        },
        Commands::Balance { command } => match command {
            BalanceCommand::Show { json, .. }
            | BalanceCommand::Compare { json, .. }
            | BalanceCommand::Savings { json, .. } => *json,
        },
        Commands::Account { command } => match command {
            AccountCommand::List { json }
            | AccountCommand::Add { json, .. }
            | AccountCommand::Opening { json, .. }
            | AccountCommand::Check { json, .. } => *json,
        },
    };
    OutputMode::from_flag(json)
}

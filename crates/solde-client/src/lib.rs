pub mod accounts;
pub mod balance;
pub mod commands;
pub mod config;
pub mod contracts;
pub mod dates;
pub mod error;
pub mod import;
pub mod migrations;
pub mod money;
pub mod setup;
pub mod state;

pub use contracts::envelope::{FailureEnvelope, SuccessEnvelope};
pub use error::{ClientError, ClientResult, ErrorKind};

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod accounts;
pub mod balance;
pub(crate) mod common;
pub mod import;

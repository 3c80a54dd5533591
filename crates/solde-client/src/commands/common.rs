use std::path::Path;

use rusqlite::Connection;

use crate::ClientResult;
use crate::setup::{SetupContext, ensure_initialized, ensure_initialized_at};
use crate::state::open_connection;

pub(crate) fn load_setup(home_override: Option<&Path>) -> ClientResult<SetupContext> {
    if let Some(home) = home_override {
        return ensure_initialized_at(home);
    }
    ensure_initialized()
}

pub(crate) fn open_store(home_override: Option<&Path>) -> ClientResult<(SetupContext, Connection)> {
    let setup = load_setup(home_override)?;
    let connection = open_connection(&setup.db_path)?;
    Ok((setup, connection))
}

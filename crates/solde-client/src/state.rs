use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Error as SqliteError, ffi::ErrorCode};

use crate::{ClientError, ClientResult};

pub const HOME_ENV_VAR: &str = "SOLDE_HOME";

pub fn resolve_store_home(home_override: Option<&Path>) -> ClientResult<PathBuf> {
    let candidate = match home_override {
        Some(path) => path.to_path_buf(),
        None => {
            if let Some(override_path) = std::env::var_os(HOME_ENV_VAR) {
                PathBuf::from(override_path)
            } else if let Some(home_path) = home::home_dir() {
                home_path.join(".solde")
            } else {
                return Err(ClientError::store_unavailable(
                    Path::new("."),
                    "Could not resolve a home directory for the store.",
                ));
            }
        }
    };

    absolutize(&candidate)
}

pub fn ensure_store_directory(path: &Path) -> ClientResult<()> {
    fs::create_dir_all(path).map_err(|error| map_io_error(path, &error))?;
    set_private_permissions_best_effort(path);
    Ok(())
}

pub fn store_db_path(home: &Path) -> PathBuf {
    home.join("solde.db")
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

pub fn open_connection(db_path: &Path) -> ClientResult<Connection> {
    let connection =
        Connection::open(db_path).map_err(|error| map_sqlite_error(db_path, &error))?;
    connection
        .busy_timeout(Duration::from_millis(250))
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(connection)
}

pub fn map_io_error(path: &Path, error: &std::io::Error) -> ClientError {
    if error.kind() == std::io::ErrorKind::PermissionDenied {
        return ClientError::store_init_permission_denied(path, &error.to_string());
    }

    ClientError::store_unavailable(path, &error.to_string())
}

pub fn map_sqlite_error(path: &Path, error: &SqliteError) -> ClientError {
    let error_code = error.sqlite_error_code();

    if matches!(
        error_code,
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    ) {
        return ClientError::store_locked(path);
    }

    if matches!(error_code, Some(ErrorCode::NotADatabase)) {
        return ClientError::store_corrupt(path);
    }

    if matches!(
        error_code,
        Some(ErrorCode::CannotOpen | ErrorCode::ReadOnly)
    ) {
        return ClientError::store_init_permission_denied(path, &error.to_string());
    }

    ClientError::store_unavailable(path, &error.to_string())
}

fn absolutize(path: &Path) -> ClientResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|error| ClientError::store_unavailable(path, &error.to_string()))
}

#[cfg(unix)]
fn set_private_permissions_best_effort(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o700));
}

#[cfg(not(unix))]
fn set_private_permissions_best_effort(_path: &Path) {}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{config_path, resolve_store_home, store_db_path};

    #[test]
    fn explicit_home_wins_and_files_live_inside_it() {
        let home = resolve_store_home(Some(Path::new("/var/lib/solde")));
        assert!(home.is_ok());
        if let Ok(home) = home {
            assert_eq!(store_db_path(&home), Path::new("/var/lib/solde/solde.db"));
            assert_eq!(config_path(&home), Path::new("/var/lib/solde/config.toml"));
        }
    }

    #[test]
    fn relative_home_is_made_absolute() {
        let home = resolve_store_home(Some(Path::new("relative-home")));
        assert!(home.is_ok());
        if let Ok(home) = home {
            assert!(home.is_absolute());
            assert!(home.ends_with("relative-home"));
        }
    }
}

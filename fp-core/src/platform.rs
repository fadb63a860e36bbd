//! Where Fencepost keeps its files, and the host it runs on.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::constants::APP_NAME;
use crate::error::{FpError, FpResult};

/// Environment variable that replaces the per-user directories with one
/// directory holding config, database and logs.
pub const HOME_ENV: &str = "FENCEPOST_HOME";

pub struct Platform;

impl Platform {
    /// Directory for the database and logs.
    ///
    /// - `$FENCEPOST_HOME` when set
    /// - Linux: `~/.local/share/Fencepost`
    /// - macOS: `~/Library/Application Support/Fencepost`
    /// - Windows: `%APPDATA%/Fencepost`
    pub fn data_dir() -> FpResult<PathBuf> {
        resolve_dir(std::env::var_os(HOME_ENV), dirs::data_dir(), "data")
    }

    /// Directory for `config.toml`. Same override as [`Platform::data_dir`].
    pub fn config_dir() -> FpResult<PathBuf> {
        resolve_dir(std::env::var_os(HOME_ENV), dirs::config_dir(), "config")
    }

    /// System hostname, reported by the health endpoint.
    pub fn hostname() -> String {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

fn resolve_dir(home: Option<OsString>, base: Option<PathBuf>, kind: &str) -> FpResult<PathBuf> {
    if let Some(home) = home.filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    base.map(|b| b.join(APP_NAME))
        .ok_or_else(|| FpError::Config(format!("could not determine {kind} directory; set {HOME_ENV}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_override_wins() {
        let dir = resolve_dir(
            Some(OsString::from("/srv/fencepost")),
            Some(PathBuf::from("/home/office/.local/share")),
            "data",
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/srv/fencepost"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let dir = resolve_dir(Some(OsString::new()), Some(PathBuf::from("/base")), "data").unwrap();
        assert_eq!(dir, PathBuf::from("/base").join(APP_NAME));
    }

    #[test]
    fn test_no_directory_is_config_error() {
        let err = resolve_dir(None, None, "config").unwrap_err();
        assert!(matches!(err, FpError::Config(ref m) if m.contains(HOME_ENV)));
    }

    #[test]
    fn test_hostname_not_empty() {
        assert!(!Platform::hostname().is_empty());
    }
}

//! Unified error type for Warden.

use std::path::PathBuf;

use warden_control::ControlError;
use warden_restart::RestartError;
use warden_source::SourceError;
use warden_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// Only setup can fail with this: the monitor loop itself logs per-tick
/// failures and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`WardenConfig`](crate::WardenConfig).
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Restart(#[from] RestartError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_control_error() {
        let err = ControlError::ProcessManager("exit status 1".into());
        let warden_err: WardenError = err.into();
        assert!(matches!(warden_err, WardenError::Control(_)));
        assert!(warden_err.to_string().contains("exit status 1"));
    }

    #[test]
    fn test_from_source_error() {
        let err = SourceError::MissingField("buildid".into());
        let warden_err: WardenError = err.into();
        assert!(matches!(warden_err, WardenError::Source(_)));
        assert!(warden_err.to_string().contains("buildid"));
    }

    #[test]
    fn test_from_restart_error() {
        let warden_err: WardenError = RestartError::NothingToCancel.into();
        assert!(matches!(warden_err, WardenError::Restart(_)));
    }

    #[test]
    fn test_from_toml_error() {
        let err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let warden_err: WardenError = err.into();
        assert!(matches!(warden_err, WardenError::ConfigParse(_)));
    }

    #[test]
    fn test_config_read_names_path() {
        let err = WardenError::ConfigRead {
            path: PathBuf::from("/etc/warden.toml"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/etc/warden.toml"));
    }
}

//! Error types for configuration handling and the navigation API

use thiserror::Error;

/// Errors raised while loading or validating configuration and site data
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value '{value}' for {parameter}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("anchor '{anchor_id}': {reason}")]
    AnchorConflict { anchor_id: String, reason: String },
}

/// Errors from the navigation session API
#[derive(Error, Debug)]
pub enum NavError {
    #[error("cannot navigate an empty path")]
    EmptyPath,

    #[error("planning worker has stopped")]
    WorkerStopped,

    #[error("failed to start planning worker: {0}")]
    Spawn(std::io::Error),

    #[error("unknown point of interest: {0}")]
    UnknownDestination(String),

    #[error("no position fix available")]
    NoFix,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type NavResult<T> = std::result::Result<T, NavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigError::InvalidParameter {
            parameter: "resolution".to_string(),
            value: "-1".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value '-1' for resolution: must be positive");

        let conflict = ConfigError::AnchorConflict {
            anchor_id: "anchor_A".to_string(),
            reason: "duplicate id".to_string(),
        };
        assert_eq!(conflict.to_string(), "anchor 'anchor_A': duplicate id");
    }

    #[test]
    fn test_config_error_converts_into_nav_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let nav: NavError = ConfigError::from(io).into();
        assert!(matches!(nav, NavError::Config(ConfigError::Io(_))));
        assert!(nav.to_string().contains("missing"));
    }
}

use std::{any::Any, io, path::PathBuf};

use msghub_error::{ErrorExt, StatusCode};
use thiserror::Error;

/// Ошибки загрузки и проверки настроек.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Invalid logging configuration: {0}")]
    Logging(#[from] LoggingError),
}

/// Ошибки инициализации логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("Invalid filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Unable to prepare log directory {}: {source}", .path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Global tracing subscriber is already installed")]
    AlreadyInitialized,
}

impl ErrorExt for SettingsError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::Load(_) => StatusCode::ConfigLoadFailed,
            Self::Invalid { .. } => StatusCode::ConfigInvalid,
            Self::Logging(e) => e.status_code(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for LoggingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidLevel(_) | Self::InvalidDirective { .. } => StatusCode::ConfigInvalid,
            Self::LogDir { .. } => StatusCode::Io,
            Self::AlreadyInitialized => StatusCode::Unexpected,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

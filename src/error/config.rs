use std::any::Any;

use subhub_error::{ErrorExt, StatusCode};
use thiserror::Error;

/// Ошибки загрузки и проверки конфигурации.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Ёмкость очереди должна быть не меньше единицы.
    #[error("{field} must be greater than zero")]
    ZeroCapacity { field: &'static str },

    #[error("unknown log format: {0}")]
    UnknownLogFormat(String),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("failed to install global logger: {0}")]
    LoggerInit(String),

    #[error("failed to load configuration: {0}")]
    Source(#[from] ::config::ConfigError),
}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidConfig
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

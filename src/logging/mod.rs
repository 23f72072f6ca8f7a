pub mod config;
mod filters;
mod formatter;

pub use config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ConfigError;

/// Устанавливает глобальный subscriber по конфигурации.
///
/// Вызывается один раз при старте процесса; повторный вызов вернёт
/// [`ConfigError::LoggerInit`].
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(config);
    let layer = formatter::build_formatter(config, std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .map_err(|e| ConfigError::LoggerInit(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = %config.format,
        "Logging system initialized"
    );
    Ok(())
}

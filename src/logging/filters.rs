use tracing_subscriber::EnvFilter;

use super::LoggingConfig;

/// Фильтр событий: `RUST_LOG`, если задан, иначе директива из конфига.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use std::env;

    use serial_test::serial;
    use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, registry::Registry};

    use super::*;
    use crate::logging::tests::BufferWriter;

    /// Тест проверяет, что директива из конфига отсекает события ниже
    /// заданного уровня.
    #[test]
    #[serial]
    fn test_config_directive_filters_levels() {
        env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..Default::default()
        };

        let writer = BufferWriter::default();
        let layer = fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_filter(build_filter_from_config(&config));
        let _guard = tracing::subscriber::set_default(Registry::default().with(layer));

        tracing::info!(target: "subhub", "info should be filtered out");
        tracing::warn!(target: "subhub", "warn should pass");

        let out = writer.contents();
        assert!(out.contains("warn should pass"));
        assert!(!out.contains("info should be filtered out"));
    }

    /// Тест проверяет, что `RUST_LOG` имеет приоритет над конфигом.
    #[test]
    #[serial]
    fn test_rust_log_takes_precedence() {
        env::set_var("RUST_LOG", "debug");
        let config = LoggingConfig {
            level: "error".to_string(),
            ..Default::default()
        };

        let writer = BufferWriter::default();
        let layer = fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_filter(build_filter_from_config(&config));
        let guard = tracing::subscriber::set_default(Registry::default().with(layer));
        env::remove_var("RUST_LOG");

        tracing::debug!(target: "subhub", "debug from env filter");
        drop(guard);

        assert!(writer.contents().contains("debug from env filter"));
    }

    #[test]
    #[serial]
    fn test_invalid_directive_falls_back_to_info() {
        env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "subhub=loud".to_string(),
            ..Default::default()
        };
        assert_eq!(
            build_filter_from_config(&config).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }
}

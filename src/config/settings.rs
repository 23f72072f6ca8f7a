use std::path::Path;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use super::BrokerConfig;
use crate::{logging::LoggingConfig, ConfigError};

/// Настройки приложения.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Загружает настройки из значений по умолчанию и переменных окружения.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Загружает настройки: значения по умолчанию, затем файл (если
    /// указан), затем переменные окружения `SUBHUB_<SECTION>__<KEY>`.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = BrokerConfig::default();

        let mut builder = Config::builder()
            // Добавляем значения по умолчанию
            .set_default(
                "broker.request_queue_capacity",
                defaults.request_queue_capacity as i64,
            )?
            .set_default(
                "broker.delete_queue_capacity",
                defaults.delete_queue_capacity as i64,
            )?
            .set_default("logging.level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        // Переменные окружения с префиксом SUBHUB_
        let cfg = builder
            .add_source(
                Environment::with_prefix("SUBHUB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.broker.validate()?;
        settings.logging.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::{env, io::Write};

    use serial_test::serial;

    use super::*;
    use crate::logging::LogFormat;

    #[test]
    #[serial]
    fn test_load_defaults() {
        env::remove_var("SUBHUB_BROKER__REQUEST_QUEUE_CAPACITY");
        let settings = Settings::load().unwrap();
        assert_eq!(settings.broker, BrokerConfig::default());
        assert_eq!(settings.logging.level, "info");
    }

    /// Тест проверяет, что переменные окружения перекрывают файл.
    #[test]
    #[serial]
    fn test_file_then_env_override() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[broker]\nrequest_queue_capacity = 3\ndefault_buffer_size = 0\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        env::set_var("SUBHUB_BROKER__REQUEST_QUEUE_CAPACITY", "5");
        let settings = Settings::load_from(Some(file.path()));
        env::remove_var("SUBHUB_BROKER__REQUEST_QUEUE_CAPACITY");

        let settings = settings.unwrap();
        assert_eq!(settings.broker.request_queue_capacity, 5);
        assert_eq!(settings.broker.default_buffer_size, 0);
        assert_eq!(settings.broker.delete_queue_capacity, 10);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_invalid_capacity_is_rejected() {
        env::set_var("SUBHUB_BROKER__DELETE_QUEUE_CAPACITY", "0");
        let result = Settings::load();
        env::remove_var("SUBHUB_BROKER__DELETE_QUEUE_CAPACITY");

        assert!(matches!(
            result,
            Err(ConfigError::ZeroCapacity {
                field: "delete_queue_capacity"
            })
        ));
    }
}

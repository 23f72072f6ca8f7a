use serde::{Deserialize, Serialize};

use crate::{pubsub::DEFAULT_BUFFER_SIZE, ConfigError};

/// Настройки брокера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Сколько запросов на подписку может ждать обработки, прежде чем
    /// новые начнут отклоняться сразу
    pub request_queue_capacity: usize,
    /// Ёмкость общей очереди удаления
    pub delete_queue_capacity: usize,
    /// Ёмкость очереди публикаций между публикатором и циклом брокера
    pub publish_queue_capacity: usize,
    /// Буфер подписки, если клиент не указал свой
    pub default_buffer_size: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            request_queue_capacity: 10,
            delete_queue_capacity: 10,
            publish_queue_capacity: 64,
            default_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl BrokerConfig {
    /// Проверяет, что все очереди имеют ненулевую ёмкость.
    ///
    /// Нулевой `default_buffer_size` допустим.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let queues = [
            ("request_queue_capacity", self.request_queue_capacity),
            ("delete_queue_capacity", self.delete_queue_capacity),
            ("publish_queue_capacity", self.publish_queue_capacity),
        ];
        for (field, capacity) in queues {
            if capacity == 0 {
                return Err(ConfigError::ZeroCapacity { field });
            }
        }
        Ok(())
    }
}

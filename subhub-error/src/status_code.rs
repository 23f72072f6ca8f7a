use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок брокера.
///
/// # Диапазоны:
/// - 1xxx: Общие ошибки
/// - 2xxx: Жизненный цикл подписки
/// - 4xxx: Переполнение очередей (backpressure)
/// - 6xxx: Состояние брокера / рантайма
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "strum").
/// - опционально: `serde_repr` для сериализации в виде числового значения
///   (feature = "serde_repr").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 1xxx: Общие ошибки ===
    InvalidConfig = 1003,

    // === 2xxx: Жизненный цикл подписки ===
    NotFound = 2000,
    SubscriberDropped = 2002,

    // === 4xxx: Переполнение очередей ===
    RequestQueueFull = 4001,
    DeleteQueueFull = 4002,
    PublishQueueFull = 4003,

    // === 6xxx: Брокер / рантайм ===
    BrokerClosed = 6000,
    Disconnected = 6001,
}

/// Уровень, на котором стоит логировать ошибку с данным кодом.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    ///
    /// Возвращает `None`, если значение не соответствует ни одному варианту.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Возвращает `true`, если операцию имеет смысл повторить позже.
    ///
    /// Брокер сам никогда не повторяет попытки: решение остаётся за
    /// вызывающим кодом.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestQueueFull | Self::DeleteQueueFull | Self::PublishQueueFull
        )
    }

    /// Ошибка переполнения одной из ограниченных очередей (диапазон 4xxx).
    pub fn is_backpressure(&self) -> bool {
        (4000..=4999).contains(&self.code())
    }

    /// Код, который завершает подписку навсегда.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RequestQueueFull | Self::SubscriberDropped | Self::BrokerClosed
        )
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::NotFound => LogLevel::Trace,
            Self::Disconnected => LogLevel::Debug,
            Self::BrokerClosed => LogLevel::Info,
            Self::SubscriberDropped
            | Self::RequestQueueFull
            | Self::DeleteQueueFull
            | Self::PublishQueueFull => LogLevel::Warn,
            Self::InvalidConfig => LogLevel::Error,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

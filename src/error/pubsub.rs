use std::any::Any;

use subhub_error::{ErrorExt, StatusCode};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::pubsub::SubscriberId;

/// Терминальная причина завершения подписки.
///
/// Попадает в канал завершения подписки не более одного раза.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// Очередь запросов переполнена: подписка не была зарегистрирована.
    #[error("request queue full")]
    RequestQueueFull,

    /// Подписчик не успел вычитать буфер и был отключён брокером.
    #[error("queue is full (subscriber {0})")]
    Dropped(SubscriberId),

    /// Цикл брокера остановлен или недоступен.
    #[error("broker is closed")]
    BrokerClosed,

    /// Очередь удаления переполнена, запрос на отписку не принят.
    #[error("delete queue full (subscriber {0})")]
    DeleteQueueFull(SubscriberId),
}

/// Ошибка публикации значения в брокер.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publish queue full")]
    QueueFull,

    #[error("broker is closed")]
    BrokerClosed,
}

/// Ошибка при неблокирующем чтении потока значений.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("no values available")]
    Empty,

    /// Писатель потока значений больше не существует.
    #[error("value stream disconnected")]
    Disconnected,
}

// === Преобразования ===

impl<T> From<mpsc::error::TrySendError<T>> for PublishError {
    fn from(err: mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PublishError::BrokerClosed,
        }
    }
}

impl<T> From<mpsc::error::SendError<T>> for PublishError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        PublishError::BrokerClosed
    }
}

impl From<mpsc::error::TryRecvError> for TryRecvError {
    fn from(err: mpsc::error::TryRecvError) -> Self {
        match err {
            mpsc::error::TryRecvError::Empty => TryRecvError::Empty,
            mpsc::error::TryRecvError::Disconnected => TryRecvError::Disconnected,
        }
    }
}

// === ErrorExt ===

impl ErrorExt for SubscriptionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestQueueFull => StatusCode::RequestQueueFull,
            Self::Dropped(_) => StatusCode::SubscriberDropped,
            Self::BrokerClosed => StatusCode::BrokerClosed,
            Self::DeleteQueueFull(_) => StatusCode::DeleteQueueFull,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "pubsub_subscription".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::Dropped(id) | Self::DeleteQueueFull(id) => {
                tags.push(("subscriber_id", id.to_string()));
            }
            _ => {}
        }

        tags
    }
}

impl ErrorExt for PublishError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::QueueFull => StatusCode::PublishQueueFull,
            Self::BrokerClosed => StatusCode::BrokerClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for TryRecvError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Empty => StatusCode::NotFound,
            Self::Disconnected => StatusCode::Disconnected,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error_display() {
        assert_eq!(
            SubscriptionError::RequestQueueFull.to_string(),
            "request queue full"
        );
        assert_eq!(
            SubscriptionError::Dropped(SubscriberId(4)).to_string(),
            "queue is full (subscriber sub-4)"
        );
    }

    /// Тест проверяет маппинг ошибок подписки на коды статуса.
    #[test]
    fn test_subscription_status_codes() {
        assert_eq!(
            SubscriptionError::Dropped(SubscriberId(1)).status_code(),
            StatusCode::SubscriberDropped
        );
        assert_eq!(
            SubscriptionError::RequestQueueFull.status_code(),
            StatusCode::RequestQueueFull
        );
        assert!(SubscriptionError::BrokerClosed.status_code().is_terminal());
        assert!(!SubscriptionError::DeleteQueueFull(SubscriberId(2))
            .status_code()
            .is_terminal());
    }

    #[test]
    fn test_dropped_metrics_tags_carry_id() {
        let tags = SubscriptionError::Dropped(SubscriberId(12)).metrics_tags();
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "subscriber_id" && v == "sub-12"));
    }

    /// Тест проверяет конвертацию ошибок tokio в ошибки публикации.
    #[test]
    fn test_publish_conversion() {
        let full: PublishError = mpsc::error::TrySendError::Full(1u8).into();
        assert_eq!(full, PublishError::QueueFull);

        let closed: PublishError = mpsc::error::TrySendError::Closed(1u8).into();
        assert_eq!(closed, PublishError::BrokerClosed);

        let send: PublishError = mpsc::error::SendError(1u8).into();
        assert_eq!(send, PublishError::BrokerClosed);
        assert!(PublishError::QueueFull.status_code().is_retryable());
    }

    #[test]
    fn test_try_recv_conversion() {
        let empty: TryRecvError = mpsc::error::TryRecvError::Empty.into();
        assert_eq!(empty, TryRecvError::Empty);
        let gone: TryRecvError = mpsc::error::TryRecvError::Disconnected.into();
        assert_eq!(gone, TryRecvError::Disconnected);
    }
}

use std::{fmt, sync::Arc};

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::{BrokerStats, Filter, Subscription};
use crate::SubscriptionError;

/// Размер буфера подписки по умолчанию.
pub const DEFAULT_BUFFER_SIZE: u16 = 10;

/// Одноразовый запрос на создание подписки.
///
/// Несёт канал ответа, фильтр и желаемый размер буфера. Поглощается
/// реестром в [`Registry::receive`](super::Registry::receive).
pub struct SubscriptionRequest<T> {
    pub(crate) reply: oneshot::Sender<Subscription<T>>,
    pub(crate) filter: Filter<T>,
    pub(crate) buffer_size: u16,
}

impl<T> SubscriptionRequest<T> {
    /// Создаёт запрос и читающий конец канала ответа.
    pub fn new<F>(
        buffer_size: u16,
        filter: F,
    ) -> (Self, oneshot::Receiver<Subscription<T>>)
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let request = Self {
            reply,
            filter: Box::new(filter),
            buffer_size,
        };
        (request, rx)
    }

    pub fn buffer_size(&self) -> u16 {
        self.buffer_size
    }

    /// Клиент перестал ждать ответ.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }
}

impl<T> fmt::Debug for SubscriptionRequest<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SubscriptionRequest")
            .field("buffer_size", &self.buffer_size)
            .field("abandoned", &self.is_abandoned())
            .finish_non_exhaustive()
    }
}

/// Запрос, уже поставленный в очередь (или сразу отклонённый).
#[derive(Debug)]
pub enum PendingSubscription<T> {
    /// Ответ уже известен: вырожденная подписка с причиной отказа.
    Ready(Subscription<T>),
    /// Ждём ответ цикла брокера.
    Waiting(oneshot::Receiver<Subscription<T>>),
}

impl<T> PendingSubscription<T> {
    /// Ожидает ответ без таймаута.
    ///
    /// Если цикл брокера остановился, не ответив, возвращается вырожденная
    /// подписка с `BrokerClosed`. Для ограниченного ожидания оберните вызов
    /// в `tokio::time::timeout`.
    pub async fn wait(self) -> Subscription<T> {
        match self {
            Self::Ready(subscription) => subscription,
            Self::Waiting(rx) => rx
                .await
                .unwrap_or_else(|_| Subscription::rejected(SubscriptionError::BrokerClosed)),
        }
    }

    /// Блокирует текущий поток до получения ответа.
    ///
    /// # Panics
    ///
    /// Паникует при вызове из асинхронного контекста tokio.
    pub fn wait_blocking(self) -> Subscription<T> {
        match self {
            Self::Ready(subscription) => subscription,
            Self::Waiting(rx) => rx
                .blocking_recv()
                .unwrap_or_else(|_| Subscription::rejected(SubscriptionError::BrokerClosed)),
        }
    }
}

/// Пишущий конец очереди запросов.
///
/// Дёшево клонируется и может использоваться из любого числа потоков:
/// постановка в очередь никогда не блокирует.
pub struct Requester<T> {
    requests: mpsc::Sender<SubscriptionRequest<T>>,
    default_buffer_size: u16,
    stats: Arc<BrokerStats>,
}

impl<T> Requester<T> {
    pub(crate) fn new(
        requests: mpsc::Sender<SubscriptionRequest<T>>,
        default_buffer_size: u16,
        stats: Arc<BrokerStats>,
    ) -> Self {
        Self {
            requests,
            default_buffer_size,
            stats,
        }
    }

    pub fn default_buffer_size(&self) -> u16 {
        self.default_buffer_size
    }

    /// Делает одну неблокирующую попытку поставить запрос в очередь.
    ///
    /// При переполнении очереди сразу возвращает вырожденную подписку с
    /// `RequestQueueFull`; повторных попыток нет.
    pub fn request<F>(
        &self,
        buffer_size: u16,
        filter: F,
    ) -> PendingSubscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let (request, reply) = SubscriptionRequest::new(buffer_size, filter);

        match self.requests.try_send(request) {
            Ok(()) => PendingSubscription::Waiting(reply),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.record_rejected();
                warn!(buffer_size, "Subscription request rejected: request queue full");
                PendingSubscription::Ready(Subscription::rejected(
                    SubscriptionError::RequestQueueFull,
                ))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.record_rejected();
                warn!(buffer_size, "Subscription request rejected: broker is closed");
                PendingSubscription::Ready(Subscription::rejected(SubscriptionError::BrokerClosed))
            }
        }
    }

    /// Подписка с буфером по умолчанию.
    pub async fn subscribe<F>(
        &self,
        filter: F,
    ) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.request(self.default_buffer_size, filter).wait().await
    }

    /// Подписка с явным размером буфера.
    ///
    /// Нулевой буфер допустим, но такой подписчик будет отключён первым же
    /// подходящим значением.
    pub async fn subscribe_with_buffer<F>(
        &self,
        buffer_size: u16,
        filter: F,
    ) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.request(buffer_size, filter).wait().await
    }

    /// Синхронный вариант [`Requester::subscribe`] для потоков вне рантайма.
    pub fn subscribe_blocking<F>(
        &self,
        filter: F,
    ) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.request(self.default_buffer_size, filter)
            .wait_blocking()
    }

    pub fn subscribe_blocking_with_buffer<F>(
        &self,
        buffer_size: u16,
        filter: F,
    ) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.request(buffer_size, filter).wait_blocking()
    }

    /// Драйвер больше не принимает запросы.
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

impl<T> Clone for Requester<T> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            default_buffer_size: self.default_buffer_size,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> fmt::Debug for Requester<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Requester")
            .field("default_buffer_size", &self.default_buffer_size)
            .field("closed", &self.requests.is_closed())
            .finish()
    }
}

//! Реестр подписок.
//!
//! `Registry` это однопоточный конечный автомат: все изменяющие методы
//! принимают `&mut self`, так что одновременный вызов из нескольких
//! потоков невозможен по построению. Единственный владелец реестра
//! (цикл брокера) крутит три обязанности в любом порядке:
//!
//! ```text
//!  Requester ──try_send──► requests ──► receive()  ──► reply (oneshot)
//!  Subscription ─try_send─► deletes ──► delete()   ──► Ok(()) в termination
//!  publisher ─────────────────────────► broadcast() ─try_send─► values
//! ```

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use super::{
    subscriber::{Delivery, Subscriber},
    subscription::closed_receiver,
    BrokerStats, Requester, SubscriberId, Subscription, SubscriptionRequest, DEFAULT_BUFFER_SIZE,
};
use crate::{config::BrokerConfig, ConfigError, SubscriptionError};

/// Читающие концы очередей запросов и удалений.
///
/// Отдаётся тому, кто крутит цикл над реестром.
#[derive(Debug)]
pub struct Inbox<T> {
    pub requests: mpsc::Receiver<SubscriptionRequest<T>>,
    pub deletes: mpsc::Receiver<SubscriberId>,
}

/// Итог одного вызова [`Registry::broadcast`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Живые подписчики, чей фильтр принял значение.
    pub matched: usize,
    pub delivered: usize,
    /// Подписчики, отключённые из-за переполнения буфера.
    pub dropped: usize,
    /// Записи клиентов, уничтоживших хэндл без отписки.
    pub disconnected: usize,
}

/// Реестр активных подписок одного типа значений.
pub struct Registry<T> {
    /// Следующий id; только растёт.
    next_id: u64,
    subscribers: HashMap<SubscriberId, Subscriber<T>>,
    requests: mpsc::Sender<SubscriptionRequest<T>>,
    deletes: mpsc::Sender<SubscriberId>,
    default_buffer_size: u16,
    stats: Arc<BrokerStats>,
}

impl<T: Clone> Registry<T> {
    /// Создаёт реестр с очередями заданной ёмкости.
    ///
    /// # Panics
    ///
    /// Паникует, если одна из ёмкостей равна нулю.
    pub fn new(
        request_capacity: usize,
        delete_capacity: usize,
    ) -> (Self, Inbox<T>) {
        Self::with_buffer_size(request_capacity, delete_capacity, DEFAULT_BUFFER_SIZE)
    }

    /// Создаёт реестр по проверенной конфигурации.
    pub fn from_config(config: &BrokerConfig) -> Result<(Self, Inbox<T>), ConfigError> {
        config.validate()?;
        Ok(Self::with_buffer_size(
            config.request_queue_capacity,
            config.delete_queue_capacity,
            config.default_buffer_size,
        ))
    }

    fn with_buffer_size(
        request_capacity: usize,
        delete_capacity: usize,
        default_buffer_size: u16,
    ) -> (Self, Inbox<T>) {
        let (requests_tx, requests_rx) = mpsc::channel(request_capacity);
        let (deletes_tx, deletes_rx) = mpsc::channel(delete_capacity);

        let registry = Self {
            next_id: 0,
            subscribers: HashMap::new(),
            requests: requests_tx,
            deletes: deletes_tx,
            default_buffer_size,
            stats: Arc::new(BrokerStats::new()),
        };
        let inbox = Inbox {
            requests: requests_rx,
            deletes: deletes_rx,
        };
        (registry, inbox)
    }

    /// Пишущий конец очереди запросов для клиентов.
    pub fn requester(&self) -> Requester<T> {
        Requester::new(
            self.requests.clone(),
            self.default_buffer_size,
            Arc::clone(&self.stats),
        )
    }

    /// Пишущий конец общей очереди удаления.
    pub fn delete_queue(&self) -> mpsc::Sender<SubscriberId> {
        self.deletes.clone()
    }

    pub fn stats(&self) -> Arc<BrokerStats> {
        Arc::clone(&self.stats)
    }

    /// Регистрирует подписчика по запросу и отвечает хэндлом.
    ///
    /// Возвращает `None`, если клиент перестал ждать ответ: запись в этом
    /// случае не создаётся и id не расходуется.
    pub fn receive(
        &mut self,
        request: SubscriptionRequest<T>,
    ) -> Option<SubscriberId> {
        if request.is_abandoned() {
            debug!("Subscription request abandoned before registration");
            return None;
        }

        let SubscriptionRequest {
            reply,
            filter,
            buffer_size,
        } = request;

        let id = SubscriberId(self.next_id);
        let (values_tx, values_rx) = if buffer_size == 0 {
            (None, closed_receiver())
        } else {
            let (tx, rx) = mpsc::channel(usize::from(buffer_size));
            (Some(tx), rx)
        };
        let (termination_tx, termination_rx) = oneshot::channel();

        let subscriber = Subscriber::new(id, values_tx, termination_tx, filter);
        let subscription =
            Subscription::registered(id, values_rx, termination_rx, self.deletes.clone());

        if let Err(mut subscription) = reply.send(subscription) {
            // Хэндл никому не достался. Его id ещё не выдан, поэтому
            // отписка из Drop задела бы следующего подписчика.
            drop(subscriber);
            let _ = subscription.try_termination();
            debug!(subscriber_id = %id, "Subscription reply lost, skipping registration");
            return None;
        }

        self.next_id += 1;
        self.subscribers.insert(id, subscriber);
        self.stats.record_registered();
        self.stats.set_active(self.subscribers.len());
        debug!(subscriber_id = %id, buffer_size, "Subscriber registered");
        Some(id)
    }

    /// Раздаёт значение всем подписчикам, чей фильтр его принимает.
    ///
    /// Запись никогда не блокирует. Подписчик, чей буфер не вместил
    /// значение, получает `Dropped` и удаляется. Записи клиентов, которые
    /// уничтожили хэндл, удаляются молча при любой рассылке. Удаление
    /// выполняется после обхода, чтобы не менять таблицу во время итерации.
    pub fn broadcast(
        &mut self,
        value: &T,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut overflowed = Vec::new();
        let mut gone = Vec::new();

        for (id, subscriber) in &self.subscribers {
            match subscriber.offer(value) {
                Delivery::Skipped => {}
                Delivery::Delivered => {
                    report.matched += 1;
                    report.delivered += 1;
                }
                Delivery::Overflow => {
                    report.matched += 1;
                    overflowed.push(*id);
                }
                Delivery::Disconnected => gone.push(*id),
            }
        }

        for id in overflowed {
            if let Some(subscriber) = self.subscribers.remove(&id) {
                debug!(subscriber_id = %id, "Subscriber queue is full, dropping");
                subscriber.terminate(Err(SubscriptionError::Dropped(id)));
                report.dropped += 1;
            }
        }
        for id in gone {
            // Сигнал отправлять некому
            if self.subscribers.remove(&id).is_some() {
                debug!(subscriber_id = %id, "Subscriber handle gone, removing");
                report.disconnected += 1;
            }
        }

        self.stats
            .record_broadcast(report.delivered, report.dropped, report.disconnected);
        if report.dropped + report.disconnected > 0 {
            self.stats.set_active(self.subscribers.len());
        }
        report
    }

    /// Удаляет подписчика и отправляет ему штатное завершение.
    ///
    /// Неизвестный id не считается ошибкой, возвращается `false`.
    pub fn delete(
        &mut self,
        id: SubscriberId,
    ) -> bool {
        let Some(subscriber) = self.subscribers.remove(&id) else {
            trace!(subscriber_id = %id, "Delete for unknown subscriber ignored");
            return false;
        };

        subscriber.terminate(Ok(()));
        self.stats.record_unsubscribed();
        self.stats.set_active(self.subscribers.len());
        debug!(subscriber_id = %id, "Subscriber unsubscribed");
        true
    }

    /// Штатно завершает всех подписчиков и очищает реестр.
    ///
    /// Буферы значений не трогаются: невычитанные значения остаются у
    /// клиентов. Возвращает число закрытых подписок.
    pub fn close(&mut self) -> usize {
        let closed = self.subscribers.len();
        for (_, subscriber) in self.subscribers.drain() {
            subscriber.terminate(Ok(()));
        }
        self.stats.set_active(0);
        if closed > 0 {
            debug!(closed, "All subscribers closed");
        }
        closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn contains(
        &self,
        id: SubscriberId,
    ) -> bool {
        self.subscribers.contains_key(&id)
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("next_id", &self.next_id)
            .field("subscribers", &self.subscribers.len())
            .field("default_buffer_size", &self.default_buffer_size)
            .finish()
    }
}

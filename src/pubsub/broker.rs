use std::{fmt, sync::Arc};

use tokio::{
    sync::{mpsc, Notify},
    task::JoinHandle,
};
use tracing::{debug, info};

use super::{
    BrokerStats, BrokerStatsSnapshot, Inbox, Registry, Requester, Subscription,
};
use crate::{config::BrokerConfig, ConfigError, PublishError};

/// Брокер значений типа `T`.
///
/// Единственный исполнитель реестра: в одном цикле обслуживает запросы
/// на подписку, очередь удаления, публикации и сигнал остановки.
/// Публикатор никогда не ждёт медленных подписчиков: те, кто не успевает
/// вычитывать буфер, отключаются.
pub struct Broker<T> {
    registry: Registry<T>,
    inbox: Inbox<T>,
    publications: mpsc::Receiver<T>,
    shutdown: Arc<Notify>,
}

/// Клиентский хэндл брокера: подписка, публикация, остановка.
pub struct BrokerHandle<T> {
    requester: Requester<T>,
    publications: mpsc::Sender<T>,
    shutdown: Arc<Notify>,
    stats: Arc<BrokerStats>,
}

impl<T: Clone + Send + 'static> Broker<T> {
    /// Создаёт брокер и хэндл к нему. Цикл нужно запустить через
    /// [`Broker::run`] или воспользоваться [`BrokerHandle::spawn`].
    pub fn new(config: &BrokerConfig) -> Result<(Self, BrokerHandle<T>), ConfigError> {
        let (registry, inbox) = Registry::from_config(config)?;
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_queue_capacity);
        let shutdown = Arc::new(Notify::new());

        let handle = BrokerHandle {
            requester: registry.requester(),
            publications: publish_tx,
            shutdown: Arc::clone(&shutdown),
            stats: registry.stats(),
        };
        let broker = Self {
            registry,
            inbox,
            publications: publish_rx,
            shutdown,
        };
        Ok((broker, handle))
    }

    /// Цикл брокера.
    ///
    /// Завершается по [`BrokerHandle::shutdown`] или когда исчезли все
    /// хэндлы. Перед выходом штатно закрывает всех подписчиков; запросы,
    /// оставшиеся в очереди, получают `BrokerClosed`.
    pub async fn run(mut self) -> BrokerStatsSnapshot {
        info!(
            subscribers = self.registry.subscriber_count(),
            "Broker driver started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    debug!("Broker shutdown requested");
                    break;
                }

                Some(request) = self.inbox.requests.recv() => {
                    self.registry.receive(request);
                }

                Some(id) = self.inbox.deletes.recv() => {
                    self.registry.delete(id);
                }

                value = self.publications.recv() => match value {
                    Some(value) => {
                        self.registry.broadcast(&value);
                    }
                    None => {
                        debug!("All broker handles dropped");
                        break;
                    }
                },
            }
        }

        let closed = self.registry.close();
        let stats = self.registry.stats().snapshot();
        info!(
            closed,
            published = stats.published,
            dropped = stats.dropped,
            "Broker driver stopped"
        );
        stats
    }
}

impl<T: Clone + Send + 'static> BrokerHandle<T> {
    /// Создаёт брокер и запускает его цикл в рантайме tokio.
    pub fn spawn(
        config: &BrokerConfig
    ) -> Result<(Self, JoinHandle<BrokerStatsSnapshot>), ConfigError> {
        let (broker, handle) = Broker::new(config)?;
        let join = tokio::spawn(broker.run());
        Ok((handle, join))
    }
}

impl<T> BrokerHandle<T> {
    /// Пишущий конец очереди запросов.
    pub fn requester(&self) -> Requester<T> {
        self.requester.clone()
    }

    /// Подписка с буфером по умолчанию.
    pub async fn subscribe<F>(
        &self,
        filter: F,
    ) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.requester.subscribe(filter).await
    }

    pub async fn subscribe_with_buffer<F>(
        &self,
        buffer_size: u16,
        filter: F,
    ) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.requester
            .subscribe_with_buffer(buffer_size, filter)
            .await
    }

    /// Блокирующая подписка для потоков вне рантайма.
    pub fn subscribe_blocking<F>(
        &self,
        filter: F,
    ) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.requester.subscribe_blocking(filter)
    }

    /// Ставит значение в очередь публикаций.
    ///
    /// Ждёт только места в очереди публикаций; цикл брокера сам никогда
    /// не блокируется на подписчиках.
    pub async fn publish(
        &self,
        value: T,
    ) -> Result<(), PublishError> {
        self.publications.send(value).await?;
        Ok(())
    }

    pub fn try_publish(
        &self,
        value: T,
    ) -> Result<(), PublishError> {
        self.publications.try_send(value)?;
        Ok(())
    }

    /// Число активных подписчиков по данным цикла брокера.
    pub fn subscriber_count(&self) -> usize {
        self.stats.active()
    }

    pub fn stats(&self) -> BrokerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Просит цикл брокера завершиться.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.publications.is_closed()
    }
}

impl<T> Clone for BrokerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            requester: self.requester.clone(),
            publications: self.publications.clone(),
            shutdown: Arc::clone(&self.shutdown),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> fmt::Debug for BrokerHandle<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("BrokerHandle")
            .field("subscribers", &self.stats.active())
            .field("closed", &self.publications.is_closed())
            .finish()
    }
}

impl<T> fmt::Debug for Broker<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Broker")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{pubsub::SubscriptionEvent, SubscriptionError};

    fn config() -> BrokerConfig {
        BrokerConfig::default()
    }

    /// Helper: ждёт, пока цикл брокера увидит нужное число подписчиков.
    async fn wait_for_count(
        handle: &BrokerHandle<u32>,
        expected: usize,
    ) {
        timeout(Duration::from_secs(1), async {
            while handle.subscriber_count() != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("subscriber count not reached");
    }

    /// Тест проверяет полный цикл: подписка, публикация, отписка.
    #[tokio::test]
    async fn test_subscribe_publish_unsubscribe() {
        let (handle, join) = BrokerHandle::<u32>::spawn(&config()).unwrap();

        let mut sub = handle.subscribe(|_| true).await;
        assert!(sub.is_registered());
        wait_for_count(&handle, 1).await;

        handle.publish(2).await.unwrap();
        let value = timeout(Duration::from_millis(500), sub.recv())
            .await
            .expect("timed out");
        assert_eq!(value, Some(2));

        sub.unsubscribe().unwrap();
        let signal = timeout(Duration::from_millis(500), sub.termination())
            .await
            .expect("timed out");
        assert_eq!(signal, Ok(()));
        wait_for_count(&handle, 0).await;

        handle.shutdown();
        let stats = join.await.unwrap();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.unsubscribed, 1);
    }

    /// Тест проверяет, что остановка брокера штатно завершает подписчиков.
    #[tokio::test]
    async fn test_shutdown_closes_subscribers() {
        let (handle, join) = BrokerHandle::<u32>::spawn(&config()).unwrap();
        let mut a = handle.subscribe(|v| v % 2 == 0).await;
        let mut b = handle.subscribe(|v| v % 2 == 1).await;

        handle.shutdown();
        let stats = join.await.unwrap();
        assert_eq!(stats.active, 0);

        assert_eq!(
            a.next_event().await,
            Some(SubscriptionEvent::Terminated(Ok(())))
        );
        assert_eq!(b.termination().await, Ok(()));

        let mut late = handle.subscribe(|_| true).await;
        assert_eq!(
            late.termination().await,
            Err(SubscriptionError::BrokerClosed)
        );
        assert_eq!(handle.try_publish(1), Err(PublishError::BrokerClosed));
    }

    /// Тест проверяет, что цикл завершается, когда исчезли все хэндлы.
    #[tokio::test]
    async fn test_run_stops_when_handles_dropped() {
        let (broker, handle) = Broker::<u32>::new(&config()).unwrap();
        let join = tokio::spawn(broker.run());
        drop(handle);

        let stats = timeout(Duration::from_secs(1), join)
            .await
            .expect("broker did not stop")
            .unwrap();
        assert_eq!(stats.registered, 0);
    }

    #[tokio::test]
    async fn test_try_publish_reports_full_queue() {
        let config = BrokerConfig {
            publish_queue_capacity: 1,
            ..Default::default()
        };
        // Цикл не запущен, поэтому очередь никто не вычитывает.
        let (_broker, handle) = Broker::<u32>::new(&config).unwrap();
        handle.try_publish(1).unwrap();
        assert_eq!(handle.try_publish(2), Err(PublishError::QueueFull));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = BrokerConfig {
            request_queue_capacity: 0,
            ..Default::default()
        };
        assert!(Broker::<u32>::new(&config).is_err());
    }
}

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Счётчики брокера.
///
/// Пишет в них только цикл брокера (и клиенты при отказе в постановке
/// запроса), читать можно из любого потока.
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Количество вызовов `broadcast`
    published: AtomicU64,
    /// Успешные доставки в буферы подписчиков
    delivered: AtomicU64,
    /// Подписчики, отключённые из-за переполнения буфера
    dropped: AtomicU64,
    /// Записи клиентов, исчезнувших без отписки
    disconnected: AtomicU64,
    /// Зарегистрированные подписки
    registered: AtomicU64,
    /// Подписки, удалённые по запросу клиента
    unsubscribed: AtomicU64,
    /// Запросы, отклонённые до регистрации
    rejected_requests: AtomicU64,
    /// Текущее число активных подписчиков
    active: AtomicUsize,
}

/// Снимок счётчиков на момент вызова [`BrokerStats::snapshot`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrokerStatsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub disconnected: u64,
    pub registered: u64,
    pub unsubscribed: u64,
    pub rejected_requests: u64,
    pub active: usize,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_broadcast(
        &self,
        delivered: usize,
        dropped: usize,
        disconnected: usize,
    ) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        self.disconnected
            .fetch_add(disconnected as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unsubscribed(&self) {
        self.unsubscribed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_active(
        &self,
        active: usize,
    ) {
        self.active.store(active, Ordering::Release);
    }

    /// Текущее число активных подписчиков.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> BrokerStatsSnapshot {
        BrokerStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            disconnected: self.disconnected.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
            unsubscribed: self.unsubscribed.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            active: self.active(),
        }
    }
}

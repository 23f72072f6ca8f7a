use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::Termination;

/// Идентификатор подписчика.
///
/// Выдаётся монотонным счётчиком реестра и никогда не переиспользуется.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Предикат, решающий, интересно ли значение подписчику.
///
/// Вызывается только из цикла брокера и не должен иметь побочных эффектов.
pub type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync + 'static>;

/// Результат попытки положить значение в буфер подписчика.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Фильтр отклонил значение.
    Skipped,
    Delivered,
    /// Буфер заполнен (или отсутствует при нулевой ёмкости).
    Overflow,
    /// Клиент уничтожил свой хэндл или приёмник значений.
    Disconnected,
}

/// Внутреннее состояние одной активной подписки.
///
/// Хранит пишущие концы каналов значений и завершения. Завершение
/// поглощает запись, поэтому сигнал может быть отправлен лишь один раз.
pub(crate) struct Subscriber<T> {
    id: SubscriberId,
    /// `None`, если подписка запрошена с нулевым буфером.
    values: Option<mpsc::Sender<T>>,
    termination: oneshot::Sender<Termination>,
    filter: Filter<T>,
}

impl<T: Clone> Subscriber<T> {
    pub(crate) fn new(
        id: SubscriberId,
        values: Option<mpsc::Sender<T>>,
        termination: oneshot::Sender<Termination>,
        filter: Filter<T>,
    ) -> Self {
        Self {
            id,
            values,
            termination,
            filter,
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    /// Применяет фильтр и делает неблокирующую попытку записи.
    ///
    /// Клиент, уничтоживший хэндл, считается отключившимся ещё до фильтра.
    pub(crate) fn offer(
        &self,
        value: &T,
    ) -> Delivery {
        if self.termination.is_closed() {
            return Delivery::Disconnected;
        }
        if !(self.filter)(value) {
            return Delivery::Skipped;
        }

        let Some(values) = &self.values else {
            return Delivery::Overflow;
        };

        match values.try_send(value.clone()) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Overflow,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Disconnected,
        }
    }

    /// Отправляет терминальный сигнал и уничтожает запись.
    ///
    /// Если клиент уже отпустил подписку, сигнал молча теряется.
    pub(crate) fn terminate(
        self,
        signal: Termination,
    ) {
        let _ = self.termination.send(signal);
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("buffered", &self.values.is_some())
            .finish_non_exhaustive()
    }
}

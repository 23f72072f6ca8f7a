use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::SubscriberId;
use crate::{SubscriptionError, TryRecvError};

/// Терминальный сигнал подписки: `Ok(())` означает штатное завершение
/// (отписка или закрытие брокера), `Err(..)` несёт причину отключения.
pub type Termination = Result<(), SubscriptionError>;

/// Событие, полученное через [`Subscription::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent<T> {
    /// Очередное значение из потока.
    Value(T),
    /// Подписка завершена; больше событий не будет.
    Terminated(Termination),
}

enum TerminationState {
    Pending(oneshot::Receiver<Termination>),
    Settled(Termination),
}

/// Клиентская сторона подписки.
///
/// Содержит читающие концы потока значений и канала завершения, а также
/// пишущий конец общей очереди удаления. Никакого изменяемого состояния
/// брокера хэндл не держит: отписка сводится к отправка своего id.
///
/// Поток значений сам по себе не сообщает об ошибках, поэтому клиент
/// должен следить и за каналом завершения. [`Subscription::next_event`]
/// делает это сам.
///
/// При `Drop` подписка отписывается, если она ещё не завершена и отписка
/// не была запрошена раньше.
pub struct Subscription<T> {
    id: Option<SubscriberId>,
    values: mpsc::Receiver<T>,
    termination: TerminationState,
    deletes: Option<mpsc::Sender<SubscriberId>>,
    /// Id уже лежит в очереди удаления
    unsubscribe_requested: AtomicBool,
    reported: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn registered(
        id: SubscriberId,
        values: mpsc::Receiver<T>,
        termination: oneshot::Receiver<Termination>,
        deletes: mpsc::Sender<SubscriberId>,
    ) -> Self {
        Self {
            id: Some(id),
            values,
            termination: TerminationState::Pending(termination),
            deletes: Some(deletes),
            unsubscribe_requested: AtomicBool::new(false),
            reported: false,
        }
    }

    /// Вырожденная подписка: запись в реестре не создавалась, сигнал
    /// завершения уже лежит в канале, поток значений пуст навсегда.
    pub(crate) fn rejected(reason: SubscriptionError) -> Self {
        Self {
            id: None,
            values: closed_receiver(),
            termination: TerminationState::Settled(Err(reason)),
            deletes: None,
            unsubscribe_requested: AtomicBool::new(false),
            reported: false,
        }
    }

    /// Идентификатор подписчика; `None` у вырожденной подписки.
    pub fn id(&self) -> Option<SubscriberId> {
        self.id
    }

    /// Была ли подписка зарегистрирована брокером.
    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }

    /// Ожидает следующее значение.
    ///
    /// `None` означает, что писатель исчез и буфер вычитан. Причину
    /// смотрите в [`Subscription::termination`].
    pub async fn recv(&mut self) -> Option<T> {
        self.values.recv().await
    }

    /// Пытается получить значение без ожидания.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.values.try_recv().map_err(Into::into)
    }

    /// Количество значений, ожидающих чтения.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ожидает терминальный сигнал.
    ///
    /// После первого получения сигнал кешируется, повторные вызовы
    /// возвращают то же значение.
    pub async fn termination(&mut self) -> Termination {
        if let TerminationState::Pending(rx) = &mut self.termination {
            let signal = rx.await.unwrap_or(Err(SubscriptionError::BrokerClosed));
            self.termination = TerminationState::Settled(signal);
        }
        self.settled()
    }

    /// Возвращает терминальный сигнал, если он уже пришёл.
    pub fn try_termination(&mut self) -> Option<Termination> {
        if let TerminationState::Pending(rx) = &mut self.termination {
            let signal = match rx.try_recv() {
                Ok(signal) => signal,
                Err(oneshot::error::TryRecvError::Empty) => return None,
                Err(oneshot::error::TryRecvError::Closed) => Err(SubscriptionError::BrokerClosed),
            };
            self.termination = TerminationState::Settled(signal);
        }
        Some(self.settled())
    }

    /// Ожидает следующее событие из обоих потоков.
    ///
    /// Уже буферизированные значения отдаются раньше сигнала завершения.
    /// Сигнал выдаётся один раз, после него возвращается `None`.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent<T>> {
        if self.reported {
            return None;
        }

        let signal = match &mut self.termination {
            TerminationState::Settled(signal) => {
                if let Ok(value) = self.values.try_recv() {
                    return Some(SubscriptionEvent::Value(value));
                }
                signal.clone()
            }
            TerminationState::Pending(rx) => {
                tokio::select! {
                    biased;
                    Some(value) = self.values.recv() => {
                        return Some(SubscriptionEvent::Value(value));
                    }
                    signal = rx => signal.unwrap_or(Err(SubscriptionError::BrokerClosed)),
                }
            }
        };

        self.termination = TerminationState::Settled(signal.clone());
        self.reported = true;
        Some(SubscriptionEvent::Terminated(signal))
    }

    /// Просит брокер удалить подписку.
    ///
    /// Неблокирующая отправка id в очередь удаления; подтверждения нет,
    /// эффект наступит, когда цикл брокера вычитает очередь. Для
    /// вырожденной подписки, а также при повторном вызове после удачной
    /// отправки ничего не делает.
    pub fn unsubscribe(&self) -> Result<(), SubscriptionError> {
        let (Some(deletes), Some(id)) = (&self.deletes, self.id) else {
            return Ok(());
        };
        if self.unsubscribe_requested.load(Ordering::Acquire) {
            return Ok(());
        }

        deletes.try_send(id).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SubscriptionError::DeleteQueueFull(id),
            mpsc::error::TrySendError::Closed(_) => SubscriptionError::BrokerClosed,
        })?;
        self.unsubscribe_requested.store(true, Ordering::Release);
        Ok(())
    }

    fn settled(&self) -> Termination {
        match &self.termination {
            TerminationState::Settled(signal) => signal.clone(),
            TerminationState::Pending(_) => Err(SubscriptionError::BrokerClosed),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if self.try_termination().is_some() {
            return;
        }
        // Если очередь удаления полна, запись уберёт ближайший broadcast:
        // реестр видит, что канал завершения закрыт.
        if let Err(e) = self.unsubscribe() {
            warn!(subscriber_id = ?self.id, error = %e, "Unsubscribe on drop failed");
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending_values", &self.values.len())
            .field(
                "terminated",
                &matches!(self.termination, TerminationState::Settled(_)),
            )
            .field(
                "unsubscribe_requested",
                &self.unsubscribe_requested.load(Ordering::Relaxed),
            )
            .finish()
    }
}

/// Приёмник без писателя: никогда не выдаст значение.
pub(crate) fn closed_receiver<T>() -> mpsc::Receiver<T> {
    let (_, rx) = mpsc::channel(1);
    rx
}

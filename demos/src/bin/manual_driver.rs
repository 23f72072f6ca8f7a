//! Ручной цикл над `Registry` без `Broker`.
//!
//! Показывает, как владелец реестра сам обслуживает очереди запросов и
//! удалений и раздаёт значения. Медленный подписчик с буфером на одно
//! значение отключается, остальные доходят до штатного закрытия.

use subhub::{Registry, SubscriptionEvent};
use tokio::sync::mpsc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), tokio::task::JoinError> {
    let (mut registry, mut inbox) = Registry::<u32>::new(8, 8);
    let requester = registry.requester();
    let (ticks_tx, mut ticks) = mpsc::channel::<u32>(4);

    let clients = tokio::spawn(async move {
        let mut all = requester.subscribe(|_| true).await;
        let mut slow = requester.subscribe_with_buffer(1, |v| v % 3 == 0).await;

        for tick in 1..=10 {
            if ticks_tx.send(tick).await.is_err() {
                break;
            }
            // Обычный подписчик успевает читать, медленный не читает вовсе
            if let Some(value) = all.recv().await {
                println!("all   <- {value}");
            }
        }
        all.unsubscribe().ok();

        while let Some(event) = slow.next_event().await {
            match event {
                SubscriptionEvent::Value(value) => println!("slow  <- {value}"),
                SubscriptionEvent::Terminated(signal) => println!("slow  terminated: {signal:?}"),
            }
        }
        println!("all   terminated: {:?}", all.termination().await);
    });

    loop {
        tokio::select! {
            Some(request) = inbox.requests.recv() => {
                registry.receive(request);
            }
            Some(id) = inbox.deletes.recv() => {
                registry.delete(id);
                if registry.is_empty() {
                    break;
                }
            }
            Some(tick) = ticks.recv() => {
                let report = registry.broadcast(&tick);
                println!("tick {tick}: {report:?}");
            }
            else => break,
        }
    }

    registry.close();
    // Паника клиентской задачи всплывает как ошибка процесса
    clients.await?;
    println!("{:?}", registry.stats().snapshot());
    Ok(())
}

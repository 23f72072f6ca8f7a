use std::time::Duration;

use subhub::{
    init_logging, BrokerHandle, Settings, Subscription, SubscriptionError, SubscriptionEvent,
};
use subhub_error::{ErrorExt, LogLevel};
use tracing::{debug, error, info, trace, warn};

/// Логирует терминальную ошибку на уровне, заданном её кодом.
fn report(
    name: &'static str,
    err: &SubscriptionError,
) {
    let code = err.status_code();
    let tags = err.metrics_tags();
    let details = err.log_message();
    match code.log_level() {
        LogLevel::Trace => trace!(name, %code, ?tags, details = %details, "Subscription terminated"),
        LogLevel::Debug => debug!(name, %code, ?tags, details = %details, "Subscription terminated"),
        LogLevel::Info => info!(name, %code, ?tags, details = %details, "Subscription terminated"),
        LogLevel::Warn => warn!(name, %code, ?tags, details = %details, "Subscription terminated"),
        LogLevel::Error => error!(name, %code, ?tags, details = %details, "Subscription terminated"),
    }
}

/// Отписка с одной повторной попыткой, если очередь удаления была полна.
async fn unsubscribe(
    name: &'static str,
    sub: &Subscription<u64>,
) {
    let Err(e) = sub.unsubscribe() else {
        return;
    };
    if e.status_code().is_retryable() {
        tokio::task::yield_now().await;
        if sub.unsubscribe().is_ok() {
            return;
        }
    }
    report(name, &e);
}

/// Читает события подписки до её завершения.
///
/// Получив `limit` значений, клиент отписывается сам.
async fn consume(
    name: &'static str,
    mut sub: Subscription<u64>,
    limit: Option<usize>,
) -> Vec<u64> {
    let mut seen = Vec::new();
    while let Some(event) = sub.next_event().await {
        match event {
            SubscriptionEvent::Value(value) => {
                seen.push(value);
                if Some(seen.len()) == limit {
                    unsubscribe(name, &sub).await;
                }
            }
            SubscriptionEvent::Terminated(Ok(())) => info!(name, "Subscription closed"),
            SubscriptionEvent::Terminated(Err(e)) => report(name, &e),
        }
    }
    seen
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_logging(&settings.logging)?;
    info!(
        commit = env!("SUBHUB_GIT_COMMIT"),
        built = env!("SUBHUB_BUILD_TIME"),
        "subhub demo starting"
    );

    let (handle, join) = BrokerHandle::<u64>::spawn(&settings.broker)?;

    let even = handle.subscribe(|v| v % 2 == 0).await;
    let odd = handle.subscribe(|v| v % 2 == 1).await;
    let even_task = tokio::spawn(consume("even", even, None));
    let odd_task = tokio::spawn(consume("odd", odd, Some(5)));

    let mut ticker = tokio::time::interval(Duration::from_millis(10));
    for tick in 1..=20u64 {
        ticker.tick().await;
        handle.publish(tick).await?;
    }

    handle.shutdown();
    let stats = join.await?;

    let even = even_task.await?;
    let odd = odd_task.await?;
    info!(?even, ?odd, "Received values");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

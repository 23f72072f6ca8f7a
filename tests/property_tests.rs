//! Property-based тесты раздачи значений.
//!
//! Генерируют случайные подписчики (буфер, делитель фильтра) и поток
//! значений и проверяют, что каждый подписчик видит ровно префикс
//! подходящих ему значений, а отключается только при переполнении.

use proptest::prelude::*;
use subhub::{Inbox, Registry, Subscription, SubscriptionError};

const PROPTEST_CASES: u32 = 256;

/// Регистрирует подписчика без рантайма: ответ уже лежит в канале.
fn register(
    registry: &mut Registry<u32>,
    inbox: &mut Inbox<u32>,
    buffer_size: u16,
    divisor: u32,
) -> Subscription<u32> {
    let pending = registry
        .requester()
        .request(buffer_size, move |v| v % divisor == 0);
    let request = inbox.requests.try_recv().expect("request queued");
    registry.receive(request).expect("registered");
    pending.wait_blocking()
}

fn drain(sub: &mut Subscription<u32>) -> Vec<u32> {
    let mut out = Vec::new();
    while let Ok(value) = sub.try_recv() {
        out.push(value);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    /// Без чтения подписчик получает первые `buffer` подходящих значений
    /// в порядке публикации и отключается, только если их было больше.
    #[test]
    fn prop_subscriber_sees_matching_prefix(
        subscribers in prop::collection::vec((0u16..8, 1u32..5), 1..6),
        values in prop::collection::vec(0u32..100, 0..40),
    ) {
        let (mut registry, mut inbox) = Registry::new(subscribers.len(), 4);
        let mut subs: Vec<_> = subscribers
            .iter()
            .map(|&(buffer, divisor)| register(&mut registry, &mut inbox, buffer, divisor))
            .collect();

        for value in &values {
            registry.broadcast(value);
        }

        for (sub, &(buffer, divisor)) in subs.iter_mut().zip(&subscribers) {
            let matching: Vec<u32> = values.iter().copied().filter(|v| v % divisor == 0).collect();
            let capacity = usize::from(buffer);
            let received = drain(sub);

            if matching.len() > capacity {
                let id = sub.id().unwrap();
                prop_assert_eq!(&received[..], &matching[..capacity]);
                prop_assert!(!registry.contains(id));
                prop_assert_eq!(
                    sub.try_termination(),
                    Some(Err(SubscriptionError::Dropped(id)))
                );
            } else {
                prop_assert_eq!(&received, &matching);
                prop_assert_eq!(sub.try_termination(), None);
            }
        }
    }

    /// Id никогда не повторяются, даже после удаления подписчиков.
    #[test]
    fn prop_ids_are_unique(count in 1usize..20, delete_every in 1usize..4) {
        let (mut registry, mut inbox) = Registry::new(count, count);
        let mut seen = std::collections::HashSet::new();
        let mut kept = Vec::new();

        for i in 0..count {
            let sub = register(&mut registry, &mut inbox, 1, 1);
            let id = sub.id().unwrap();
            prop_assert!(seen.insert(id));
            if i % delete_every == 0 {
                registry.delete(id);
            }
            kept.push(sub);
        }

        prop_assert_eq!(registry.stats().snapshot().registered, count as u64);
    }
}

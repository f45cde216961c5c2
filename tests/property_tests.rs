//! Property-based тесты реестра подписок.
//!
//! Случайные последовательности подписок, отписок и публикаций сверяются с
//! простой моделью; отдельные свойства проверяют чередование операций из
//! нескольких потоков.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
};

use msghub::{GenericMessage, Hub, SubscriptionToken};
use parking_lot::Mutex;
use proptest::prelude::*;

/// Базовая настройка proptest - количество итераций
const PROPTEST_CASES: u32 = 256;

type Num = GenericMessage<u8>;

#[derive(Debug, Clone)]
enum Op {
    /// Подписка; `Some(m)` задаёт фильтр «делится на m».
    Subscribe(Option<u8>),
    /// Отписка токена с индексом по модулю числа выданных токенов.
    Unsubscribe(usize),
    Publish(u8),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop::option::of(1u8..5).prop_map(Op::Subscribe),
        2 => any::<usize>().prop_map(Op::Unsubscribe),
        4 => any::<u8>().prop_map(Op::Publish),
        1 => Just(Op::Clear),
    ]
}

/// Модель: живые подписки в порядке регистрации.
#[derive(Default)]
struct Model {
    live: Vec<(usize, Option<u8>)>,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    /// Свойство: после любой последовательности операций число подписок и
    /// журнал доставок совпадают с моделью.
    #[test]
    fn prop_sequential_ops_match_model(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let hub = Hub::new();
        let log: Arc<Mutex<Vec<(usize, u8)>>> = Arc::default();
        let mut tokens: Vec<(usize, SubscriptionToken)> = Vec::new();
        let mut model = Model::default();
        let mut expected_log = Vec::new();

        for op in ops {
            match op {
                Op::Subscribe(divisor) => {
                    let id = tokens.len();
                    let log = log.clone();
                    let action = move |m: &Num| log.lock().push((id, *m.content()));
                    let token = match divisor {
                        Some(d) => hub.subscribe_filtered(action, move |m: &Num| m.content() % d == 0),
                        None => hub.subscribe(action),
                    };
                    tokens.push((id, token));
                    model.live.push((id, divisor));
                }
                Op::Unsubscribe(index) => {
                    if tokens.is_empty() {
                        continue;
                    }
                    let (id, token) = &tokens[index % tokens.len()];
                    hub.unsubscribe::<Num>(token).unwrap();
                    model.live.retain(|(live_id, _)| live_id != id);
                }
                Op::Publish(value) => {
                    hub.publish(Num::anonymous(value)).unwrap();
                    for (id, divisor) in &model.live {
                        if divisor.map_or(true, |d| value % d == 0) {
                            expected_log.push((*id, value));
                        }
                    }
                }
                Op::Clear => {
                    let removed = hub.clear::<Num>();
                    prop_assert_eq!(removed, model.live.len());
                    model.live.clear();
                }
            }
            prop_assert_eq!(hub.subscription_count::<Num>(), model.live.len());
        }

        prop_assert_eq!(&*log.lock(), &expected_log);
    }

    /// Свойство: параллельные подписки и отписки из нескольких потоков
    /// оставляют ровно те подписки, которые не были сняты.
    #[test]
    fn prop_concurrent_interleavings_preserve_count(
        plans in prop::collection::vec(prop::collection::vec(any::<bool>(), 1..40), 2..6),
    ) {
        let hub = Hub::new();
        let barrier = Arc::new(Barrier::new(plans.len()));
        let delivered = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = plans
            .iter()
            .cloned()
            .map(|plan| {
                let (hub, barrier, delivered) = (hub.clone(), barrier.clone(), delivered.clone());
                thread::spawn(move || {
                    barrier.wait();
                    let mut kept = 0;
                    for keep in plan {
                        let d = delivered.clone();
                        let token = hub.subscribe(move |_: &Num| {
                            d.fetch_add(1, Ordering::Relaxed);
                        });
                        hub.publish(Num::anonymous(0)).unwrap();
                        if keep {
                            kept += 1;
                        } else {
                            hub.unsubscribe::<Num>(&token).unwrap();
                            hub.unsubscribe::<Num>(&token).unwrap();
                        }
                    }
                    kept
                })
            })
            .collect();

        let kept: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        prop_assert_eq!(hub.subscription_count::<Num>(), kept);

        let before = delivered.load(Ordering::SeqCst);
        hub.publish(Num::anonymous(1)).unwrap();
        prop_assert_eq!(delivered.load(Ordering::SeqCst) - before, kept);
    }

    /// Свойство: токены, выданные одному хабу, уникальны и не принадлежат
    /// другому хабу.
    #[test]
    fn prop_tokens_are_unique(count in 1usize..100) {
        let hub = Hub::new();
        let other = Hub::new();
        let tokens: Vec<_> = (0..count).map(|_| hub.subscribe(|_: &Num| {})).collect();

        let mut by_id = BTreeMap::new();
        for token in &tokens {
            prop_assert!(token.belongs_to(&hub));
            prop_assert!(!token.belongs_to(&other));
            by_id.insert(token.id(), token.clone());
        }
        prop_assert_eq!(by_id.len(), count);
        for (i, a) in tokens.iter().enumerate() {
            for b in &tokens[i + 1..] {
                prop_assert_ne!(a, b);
            }
        }
    }
}

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
};

use msghub::{DeliveryAction, GenericMessage, Hub, SubscriptionToken};

/// Кол-во итераций на поток для стресс теста
const STRESS_ITERATIONS: usize = 2_000;

/// Кол-во потоков для стресс тестов
const STRESS_THREADS: usize = 8;

type Event = GenericMessage<usize>;

/// Тест проверяет, что параллельные подписки не теряются.
#[test]
fn test_concurrent_subscribe_no_lost_updates() {
    let hub = Hub::new();
    let barrier = Arc::new(Barrier::new(STRESS_THREADS));
    let mut handles = vec![];

    for _ in 0..STRESS_THREADS {
        let hub = hub.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            (0..STRESS_ITERATIONS)
                .map(|_| hub.subscribe(|_: &Event| {}))
                .collect::<Vec<_>>()
        }));
    }

    let tokens: Vec<SubscriptionToken> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(hub.subscription_count::<Event>(), STRESS_THREADS * STRESS_ITERATIONS);
    let mut ids: Vec<u64> = tokens.iter().map(SubscriptionToken::id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), tokens.len());
}

/// Тест проверяет, что параллельная отписка одних и тех же токенов
/// удаляет каждую подписку ровно один раз.
#[test]
fn test_concurrent_unsubscribe_no_duplicate_removal() {
    let hub = Hub::new();
    let tokens: Arc<Vec<SubscriptionToken>> = Arc::new(
        (0..STRESS_ITERATIONS)
            .map(|_| hub.subscribe(|_: &Event| {}))
            .collect(),
    );
    let removed = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(STRESS_THREADS));
    let mut handles = vec![];

    for _ in 0..STRESS_THREADS {
        let (tokens, removed, barrier) = (tokens.clone(), removed.clone(), barrier.clone());
        handles.push(thread::spawn(move || {
            barrier.wait();
            for token in tokens.iter() {
                if token.release() {
                    removed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(removed.load(Ordering::SeqCst), STRESS_ITERATIONS);
    assert_eq!(hub.total_subscriptions(), 0);
}

/// Тест проверяет смешанную нагрузку: публикующие потоки работают
/// одновременно с подписывающимися и отписывающимися. Постоянный
/// подписчик получает каждое сообщение ровно один раз.
#[test]
fn test_publish_during_churn() {
    let hub = Hub::new();
    let stable_hits = Arc::new(AtomicUsize::new(0));
    let h = stable_hits.clone();
    hub.subscribe(move |_: &Event| {
        h.fetch_add(1, Ordering::SeqCst);
    });

    let publishers = STRESS_THREADS / 2;
    let churners = STRESS_THREADS - publishers;
    let barrier = Arc::new(Barrier::new(STRESS_THREADS));
    let mut handles = vec![];

    for p in 0..publishers {
        let (hub, barrier) = (hub.clone(), barrier.clone());
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..STRESS_ITERATIONS {
                hub.publish(Event::anonymous(p * STRESS_ITERATIONS + i))
                    .unwrap();
            }
        }));
    }

    for _ in 0..churners {
        let (hub, barrier) = (hub.clone(), barrier.clone());
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..STRESS_ITERATIONS {
                let token = hub.subscribe(|_: &Event| {});
                if i % 3 == 0 {
                    hub.publish(Event::anonymous(i)).unwrap();
                }
                hub.unsubscribe::<Event>(&token).unwrap();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let churn_publishes = churners * STRESS_ITERATIONS.div_ceil(3);
    let expected = publishers * STRESS_ITERATIONS + churn_publishes;
    assert_eq!(stable_hits.load(Ordering::SeqCst), expected);
    assert_eq!(hub.subscription_count::<Event>(), 1);
    assert_eq!(hub.stats().publish_count as usize, expected);
}

/// Тест проверяет, что подписчик может подписываться и отписываться
/// изнутри доставки из нескольких потоков без взаимной блокировки.
#[test]
fn test_reentrant_subscribe_from_delivery() {
    let hub = Hub::new();
    let inner_hits = Arc::new(AtomicUsize::new(0));

    let (outer_hub, hits) = (hub.clone(), inner_hits.clone());
    hub.subscribe(move |m: &Event| {
        let hits = hits.clone();
        let token = outer_hub.subscribe(move |_: &GenericMessage<String>| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        outer_hub
            .publish(GenericMessage::anonymous(m.content().to_string()))
            .unwrap();
        token.release();
    });

    let barrier = Arc::new(Barrier::new(STRESS_THREADS));
    let handles: Vec<_> = (0..STRESS_THREADS)
        .map(|t| {
            let (hub, barrier) = (hub.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                for i in 0..100 {
                    hub.publish(Event::anonymous(t * 100 + i)).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert!(inner_hits.load(Ordering::SeqCst) >= STRESS_THREADS * 100);
    assert_eq!(hub.subscription_count::<GenericMessage<String>>(), 0);
}

/// Тест проверяет, что слабые подписки, освобождённые в других потоках,
/// не ломают публикацию и снимаются `prune_dead`.
#[test]
fn test_weak_subscriptions_released_concurrently() {
    let hub = Hub::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(STRESS_THREADS + 1));
    let mut handles = vec![];

    for _ in 0..STRESS_THREADS {
        let (hub, hits, barrier) = (hub.clone(), hits.clone(), barrier.clone());
        handles.push(thread::spawn(move || {
            let action: DeliveryAction<Event> = Arc::new(move |_: &Event| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
            hub.subscribe_weak(&action);
            barrier.wait();
            drop(action);
        }));
    }

    let publisher = {
        let (hub, barrier) = (hub.clone(), barrier.clone());
        thread::spawn(move || {
            barrier.wait();
            for i in 0..STRESS_ITERATIONS {
                hub.publish(Event::anonymous(i)).unwrap();
            }
        })
    };

    for h in handles {
        h.join().unwrap();
    }
    publisher.join().unwrap();

    let before = hits.load(Ordering::SeqCst);
    hub.publish(Event::anonymous(0)).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), before);
    assert_eq!(hub.prune_dead(), STRESS_THREADS);
    assert_eq!(hub.total_subscriptions(), 0);
}

//! Multi-threaded runtime: drains run on another worker than the caller.
//!
//! Time is real here (`start_paused` needs the current-thread runtime), so
//! these wait on queue state with a timeout instead of advancing the clock.

use std::sync::Arc;

use super::harness::{Harness, seed};
use crate::domain::QueueEventKind::{Processing, Queued, Success};
use crate::domain::{EnqueueOptions, Method};
use crate::impls::MemoryStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn builder_listener_sees_startup_drain() {
    for _ in 0..20 {
        let store = Arc::new(MemoryStore::new());
        let ids = seed(&store, &["A"]);

        let h = Harness::with_store(store, true);
        h.drained().await;

        assert_eq!(h.exec.call_ids(), ids);
        assert_eq!(h.events.kinds(), vec![Processing, Success]);
        h.shut_down();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queued_always_precedes_processing() {
    let h = Harness::new(true);

    let ids: Vec<_> = (0..50).map(|n| h.enqueue(&format!("op-{n}"), n % 3)).collect();
    h.drained().await;

    assert_eq!(h.exec.call_count(), 50);
    assert_eq!(h.events.count(Success), 50);
    for id in ids {
        let queued = h.events.position(Queued, id).unwrap();
        let processing = h.events.position(Processing, id).unwrap();
        assert!(queued < processing, "{id}: processing at {processing}, queued at {queued}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_share_one_drain() {
    let h = Harness::new(true);

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = h.queue.clone();
            tokio::spawn(async move {
                for n in 0..10 {
                    queue
                        .enqueue(
                            format!("producer-{p}.op-{n}"),
                            Method::Post,
                            "/api/sync",
                            None,
                            EnqueueOptions::new(),
                        )
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }
    h.drained().await;

    assert_eq!(h.exec.call_count(), 40);
    assert_eq!(h.exec.max_in_flight(), 1);
    assert_eq!(h.events.count(Queued), 40);
    assert_eq!(h.events.count(Success), 40);
    assert!(h.persisted().is_empty());
}

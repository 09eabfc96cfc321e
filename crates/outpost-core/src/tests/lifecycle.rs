//! Removal, clear, destroy, input validation and listeners.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::harness::{Harness, Recorder, epoch, settle, transient};
use crate::domain::QueueEventKind::{Cleared, Processing, Queued, Retry};
use crate::domain::{EnqueueOptions, ItemState, Method, QueueError, QueueEvent};

#[tokio::test(start_paused = true)]
async fn removed_in_flight_item_success_is_ignored() {
    let h = Harness::new(true);
    let gate = h.exec.hold();
    let a = h.enqueue("A", 0);
    settle().await;
    assert_eq!(h.queue.status().in_flight, Some(a));

    assert!(h.queue.remove(a));
    assert!(!h.queue.remove(a));
    gate.add_permits(1);
    h.queue.wait_idle().await;

    assert_eq!(h.events.kinds(), vec![Queued, Processing]);
    assert!(h.queue.is_empty());
    assert!(h.persisted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn removed_in_flight_item_failure_is_not_reinserted() {
    let h = Harness::new(true);
    let gate = h.exec.hold();
    h.exec.push(transient());
    let a = h.enqueue("A", 0);
    settle().await;

    assert!(h.queue.remove(a));
    gate.add_permits(1);
    h.queue.wait_idle().await;

    assert_eq!(h.events.count(Retry), 0);
    assert!(h.queue.is_empty());
    assert_eq!(h.timers.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn remove_cancels_backoff_timer() {
    let h = Harness::new(true);
    h.exec.push(transient());
    let a = h.enqueue("A", 0);
    h.queue.wait_idle().await;
    assert_eq!(h.timers.pending_count(), 1);

    assert!(h.queue.remove(a));
    assert_eq!(h.queue.item_state(a), None);
    assert_eq!(h.timers.pending_count(), 0);
    assert_eq!(h.timers.advance(Duration::from_secs(5)), 0);
    assert_eq!(h.exec.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn clear_empties_and_notifies() {
    let h = Harness::new(true);
    h.exec.push(transient());
    h.enqueue("A", 0);
    h.queue.wait_idle().await;
    h.net.set_online(false);
    settle().await;
    h.enqueue("B", 0);

    h.queue.clear();

    assert!(h.queue.is_empty());
    assert!(h.persisted().is_empty());
    assert_eq!(h.timers.pending_count(), 0);
    assert!(matches!(
        h.events.last(),
        Some(QueueEvent::Cleared { queue_size: 0 })
    ));
    assert_eq!(h.events.count(Cleared), 1);
}

#[tokio::test(start_paused = true)]
async fn destroy_rejects_further_work_and_keeps_stored_items() {
    let h = Harness::new(false);
    h.enqueue("A", 0);

    h.queue.destroy();
    h.queue.destroy();

    assert!(h.queue.is_destroyed());
    assert_eq!(h.queue.status().listeners, 0);
    let err = h
        .queue
        .enqueue("B", Method::Post, "/api/sync", None, EnqueueOptions::new())
        .unwrap_err();
    assert!(matches!(err, QueueError::Destroyed));

    h.net.set_online(true);
    settle().await;
    assert_eq!(h.exec.call_count(), 0);
    assert_eq!(h.persisted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn enqueue_validates_input() {
    let h = Harness::new(false);

    let cases = [
        ("", Method::Post, "/api/x", None),
        ("op", Method::Post, " ", None),
        ("op", Method::Get, "/api/x", Some(json!({"q": 1}))),
        ("op", Method::Delete, "/api/x", Some(json!({}))),
    ];
    for (operation, method, target, payload) in cases {
        let err = h
            .queue
            .enqueue(operation, method, target, payload, EnqueueOptions::new())
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidItem(_)), "{err}");
    }

    assert!(h.queue.is_empty());
    assert!(h.events.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn enqueue_applies_defaults_and_options() {
    let h = Harness::new(false);
    let id = h.enqueue_with(
        "profile.update",
        EnqueueOptions::new()
            .with_header("x-trace", "abc")
            .with_metadata("origin", json!("settings")),
    );

    let item = &h.queue.snapshot()[0];
    assert_eq!(item.id, id);
    assert_eq!(item.retry_count, 0);
    assert_eq!(item.max_retries, 3);
    assert_eq!(item.priority, 0);
    assert_eq!(item.headers.get("x-trace").map(String::as_str), Some("abc"));
    assert_eq!(item.metadata.get("origin"), Some(&json!("settings")));
    assert_eq!(item.created_at, epoch());
    assert_eq!(h.queue.item_state(id), Some(ItemState::Queued));
}

#[tokio::test(start_paused = true)]
async fn panicking_listener_does_not_affect_others() {
    let h = Harness::new(false);
    h.queue.subscribe(|_| panic!("listener bug"));
    let after = Recorder::new();
    h.queue.subscribe(after.listener());

    h.enqueue("A", 0);

    assert_eq!(h.queue.len(), 1);
    assert_eq!(h.events.kinds(), vec![Queued]);
    assert_eq!(after.kinds(), vec![Queued]);
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_listener_stops_receiving() {
    let h = Harness::new(false);
    let extra = Recorder::new();
    let sub = h.queue.subscribe(extra.listener());

    h.enqueue("A", 0);
    assert!(sub.unsubscribe());
    h.enqueue("B", 0);

    assert_eq!(extra.kinds(), vec![Queued]);
    assert_eq!(h.events.kinds(), vec![Queued, Queued]);
}

#[tokio::test(start_paused = true)]
async fn listener_may_read_the_queue() {
    let h = Harness::new(false);
    let q = h.queue.clone();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let s = seen.clone();
    h.queue.subscribe(move |_| s.lock().push(q.len()));

    h.enqueue("A", 0);
    h.enqueue("B", 0);
    assert_eq!(*seen.lock(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn listener_sees_queued_item_before_it_is_attempted() {
    let h = Harness::new(true);
    let q = h.queue.clone();
    let states = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let s = states.clone();
    h.queue.subscribe(move |event| {
        if let QueueEvent::Queued { item, .. } = event {
            s.lock().push(q.item_state(item.id));
        }
    });

    h.enqueue("A", 0);
    h.queue.wait_idle().await;
    assert_eq!(*states.lock(), vec![Some(ItemState::Queued)]);
    assert_eq!(h.events.kinds()[..2], [Queued, Processing]);
}

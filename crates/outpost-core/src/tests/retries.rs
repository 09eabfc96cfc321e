//! Backoff schedule, retry ceiling and error classification.

use std::time::Duration;

use super::harness::{Harness, ms, settle, transient};
use crate::domain::QueueEventKind::{Error, Processing, Queued, Retry, Success};
use crate::domain::{EnqueueOptions, ExecutorError, ItemState, QueueEvent};

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_retries() {
    let h = Harness::new(true);
    h.exec.push_repeated(transient(), 10);

    h.enqueue_with("A", EnqueueOptions::new().with_max_retries(2));
    h.queue.wait_idle().await;

    h.timers.advance(ms(100));
    h.queue.wait_idle().await;
    h.timers.advance(ms(200));
    h.queue.wait_idle().await;

    assert_eq!(
        h.events.kinds(),
        vec![Queued, Processing, Retry, Processing, Retry, Processing, Error]
    );
    let retry_counts: Vec<u32> = h
        .events
        .events()
        .iter()
        .filter(|e| e.kind() == Retry)
        .filter_map(|e| e.item().map(|i| i.retry_count))
        .collect();
    assert_eq!(retry_counts, vec![1, 2]);
    assert_eq!(h.exec.call_count(), 3);
    assert_eq!(h.events.last().unwrap().queue_size(), 0);
    assert!(h.queue.is_empty());
    assert!(h.persisted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_up_to_the_ceiling() {
    let h = Harness::new(true);
    h.exec.push_repeated(transient(), 10);

    h.enqueue_with("A", EnqueueOptions::new().with_max_retries(5));
    h.queue.wait_idle().await;
    for delay in [100, 200, 400, 800, 1000] {
        assert_eq!(h.timers.next_due_in(), Some(ms(delay)));
        h.timers.advance(ms(delay));
        h.queue.wait_idle().await;
    }

    assert_eq!(
        h.timers.requested_delays(),
        vec![ms(100), ms(200), ms(400), ms(800), ms(1000)]
    );
    assert_eq!(h.events.count(Retry), 5);
    assert_eq!(h.events.count(Error), 1);

    let delays: Vec<Duration> = h
        .events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            QueueEvent::Retry { delay, .. } => Some(delay),
            _ => None,
        })
        .collect();
    assert_eq!(delays, h.timers.requested_delays());
}

#[tokio::test(start_paused = true)]
async fn retry_count_is_persisted() {
    let h = Harness::new(true);
    h.exec.push(transient());

    let id = h.enqueue("A", 0);
    h.queue.wait_idle().await;

    assert_eq!(h.queue.item_state(id), Some(ItemState::RetryScheduled));
    assert_eq!(h.persisted()[0].retry_count, 1);
    assert_eq!(h.queue.status().backing_off, 1);
}

#[tokio::test(start_paused = true)]
async fn permanent_error_skips_retries() {
    let h = Harness::new(true);
    h.exec.push(Err(ExecutorError::permanent("422 unprocessable")));

    h.enqueue("A", 0);
    h.queue.wait_idle().await;

    assert_eq!(h.events.kinds(), vec![Queued, Processing, Error]);
    assert_eq!(h.exec.call_count(), 1);
    assert_eq!(h.timers.pending_count(), 0);
    let err = h.events.last().unwrap().error().cloned().unwrap();
    assert_eq!(err.message(), "422 unprocessable");
}

#[tokio::test(start_paused = true)]
async fn connectivity_error_is_not_counted() {
    let h = Harness::new(true);
    h.exec
        .push(Err(ExecutorError::connectivity("network unreachable")));

    let id = h.enqueue("A", 0);
    h.queue.wait_idle().await;

    assert_eq!(h.queue.snapshot()[0].retry_count, 0);
    assert_eq!(h.queue.item_state(id), Some(ItemState::Queued));
    assert!(!h.queue.is_online());
    assert_eq!(h.events.count(Retry), 0);
    assert_eq!(h.events.count(Error), 0);

    // provider still says online; the next poll corrects the belief and drains
    tokio::time::sleep(Duration::from_millis(1100)).await;
    h.queue.wait_idle().await;
    assert!(h.queue.is_online());
    assert!(h.queue.is_empty());
    assert_eq!(h.exec.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn backing_off_item_does_not_block_later_items() {
    let h = Harness::new(false);
    h.exec.push(transient());
    let a = h.enqueue("A", 5);
    let b = h.enqueue("B", 0);

    h.net.set_online(true);
    settle().await;
    h.queue.wait_idle().await;

    assert_eq!(h.exec.call_ids(), vec![a, b]);
    assert_eq!(h.ids(), vec![a]);
    assert_eq!(h.queue.item_state(a), Some(ItemState::RetryScheduled));
    assert_eq!(h.queue.item_state(b), None);

    assert_eq!(h.timers.advance(ms(100)), 1);
    h.queue.wait_idle().await;
    assert_eq!(h.exec.call_ids(), vec![a, b, a]);
    assert!(h.queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn executor_panic_counts_as_failed_attempt() {
    let h = Harness::new(true);
    h.exec.panic_once();

    h.enqueue("A", 0);
    h.queue.wait_idle().await;
    assert_eq!(h.events.count(Retry), 1);

    h.timers.advance(ms(100));
    h.queue.wait_idle().await;
    assert_eq!(h.events.count(Success), 1);
    assert!(h.queue.is_empty());
}

//! OfflineQueue - オフライン時のリクエストを溜めて、オンライン復帰時に送る
//!
//! # 設計原則
//! - 状態（アイテム列・drain 中フラグ・バックオフ中集合）は 1 つのロックで守る
//! - 列を変更したら、ロックを持ったまま毎回フル保存する
//! - 起動時にスロットを読めなかった場合は保存を保留し、読めた時点で保存済みの内容とマージする
//! - イベントはロックの外で発行する（リスナーからキューを触ってもデッドロックしない）
//! - drain は同時に 1 本だけ。開始判定と終了判定は同じロックの下で行う
//! - 投入直後のアイテムは `queued` を発行し終えるまで drain の対象外
//! - 同じ優先度内の順序は投入順。時計が戻っても `created_at` は単調に増える
//!
//! # drain ループ
//! ```text
//! loop {
//!     オフライン or destroy 済み → 終了
//!     実行可能（Queued）な先頭アイテムを選ぶ（なければ終了）
//!     processing イベント
//!     executor.execute(item)
//!     成功 → 削除 + success / 失敗 → RetryPolicy に従う
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::channel::{EventChannel, Listener, Subscription};
use super::config::QueueConfig;
use super::monitor::{ConnectivityMonitor, TransitionHook};
use super::retry::{GiveUpReason, RetryDecision, RetryPolicy};
use super::slot::{QueueSlot, Recovery};
use crate::domain::item::insert_ordered;
use crate::domain::snapshot;
use crate::domain::{
    EnqueueOptions, ExecutorError, ItemId, ItemState, Method, QueueError, QueueEvent, QueueItem,
};
use crate::observability::QueueStatus;
use crate::ports::{
    CancelToken, Clock, ConnectivityProvider, DurableStore, IdGenerator, RequestExecutor,
    Scheduler,
};

/// Collaborators wired by `QueueBuilder`.
pub(crate) struct QueueParts {
    pub config: QueueConfig,
    pub store: Arc<dyn DurableStore>,
    pub connectivity: Arc<dyn ConnectivityProvider>,
    pub executor: Arc<dyn RequestExecutor>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    /// Registered before the first drain.
    pub listeners: Vec<Listener>,
    pub runtime: Handle,
}

/// Durable, prioritized queue of outbound requests.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<Inner>,
}

struct Inner {
    config: QueueConfig,
    policy: RetryPolicy,
    slot: QueueSlot,
    executor: Arc<dyn RequestExecutor>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    channel: Arc<EventChannel>,
    monitor: ConnectivityMonitor,
    runtime: Handle,
    load_diagnostic: Option<String>,
    state: Mutex<State>,
    /// true while a drain is running; only written under `state`
    draining_tx: watch::Sender<bool>,
}

#[derive(Default)]
struct State {
    items: Vec<QueueItem>,
    draining: bool,
    /// Items waiting out a retry delay, with the timer that releases them.
    backing_off: HashMap<ItemId, CancelToken>,
    in_flight: Option<ItemId>,
    /// Enqueued items whose `Queued` event has not been emitted yet.
    announcing: HashSet<ItemId>,
    /// Largest `created_at` handed out or restored.
    last_created_at: Option<DateTime<Utc>>,
    /// The slot could not be read at startup; its contents are unknown.
    restore_pending: bool,
    destroyed: bool,
}

impl State {
    /// `None` once the item left the queue.
    fn state_of(&self, id: ItemId) -> Option<ItemState> {
        self.items
            .iter()
            .any(|i| i.id == id)
            .then(|| self.held_state(id))
    }

    /// State of an item known to be in `items`.
    fn held_state(&self, id: ItemId) -> ItemState {
        if self.in_flight == Some(id) {
            ItemState::Processing
        } else if self.backing_off.contains_key(&id) {
            ItemState::RetryScheduled
        } else {
            ItemState::Queued
        }
    }

    /// Next item a drain may hand to the executor.
    fn next_runnable(&self) -> Option<&QueueItem> {
        self.items
            .iter()
            .filter(|i| !self.announcing.contains(&i.id))
            .find(|i| self.held_state(i.id).is_runnable())
    }

    fn note_created(&mut self, items: &[QueueItem]) {
        let newest = items.iter().map(|i| i.created_at).max();
        self.last_created_at = self.last_created_at.max(newest);
    }
}

enum Flow {
    Continue,
    Stop,
}

impl OfflineQueue {
    pub(crate) fn start(parts: QueueParts) -> Self {
        let QueueParts {
            config,
            store,
            connectivity,
            executor,
            scheduler,
            clock,
            ids,
            listeners,
            runtime,
        } = parts;

        let slot = QueueSlot::new(store, config.storage_key.clone());
        let restored = slot.load();
        if restored.needs_rewrite {
            slot.save(&restored.items);
        }
        if let Some(diagnostic) = &restored.diagnostic {
            warn!(key = %slot.key(), diagnostic = %diagnostic, "queue restored with problems");
        }

        let policy = RetryPolicy::new(config.base_delay, config.max_delay);
        let (draining_tx, _) = watch::channel(false);
        let channel = Arc::new(EventChannel::new());
        for listener in listeners {
            channel.register(listener);
        }

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let hook: TransitionHook = Arc::new(move |online| {
                if !online {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    inner.trigger_drain();
                }
            });
            let monitor = ConnectivityMonitor::start(
                connectivity,
                config.online_check_interval,
                &runtime,
                hook,
            );

            Inner {
                policy,
                slot,
                executor,
                scheduler,
                clock,
                ids,
                channel,
                monitor,
                runtime,
                load_diagnostic: restored.diagnostic,
                state: Mutex::new({
                    let mut state = State {
                        restore_pending: restored.unreadable,
                        ..State::default()
                    };
                    state.note_created(&restored.items);
                    state.items = restored.items;
                    state
                }),
                draining_tx,
                config,
            }
        });

        info!(
            key = %inner.config.storage_key,
            restored = inner.state.lock().items.len(),
            online = inner.monitor.is_online(),
            "offline queue started"
        );
        inner.trigger_drain();

        Self { inner }
    }

    /// Buffers an operation and returns its id.
    ///
    /// The item is persisted before this returns. If online and idle, a
    /// drain starts in the background once `Queued` has been emitted.
    pub fn enqueue(
        &self,
        operation_type: impl Into<String>,
        method: Method,
        target: impl Into<String>,
        payload: Option<serde_json::Value>,
        options: EnqueueOptions,
    ) -> Result<ItemId, QueueError> {
        let inner = &self.inner;
        let mut item = QueueItem {
            id: inner.ids.generate_item_id(),
            created_at: inner.clock.now(),
            operation_type: operation_type.into(),
            method,
            target: target.into(),
            payload,
            headers: options.headers,
            retry_count: 0,
            max_retries: options.max_retries.unwrap_or(inner.config.max_retries),
            priority: options.priority,
            metadata: options.metadata,
        };
        item.validate().map_err(QueueError::InvalidItem)?;

        let queue_size = {
            let mut state = inner.state.lock();
            if state.destroyed {
                return Err(QueueError::Destroyed);
            }
            // a clock stepping backwards must not reorder equal priorities
            if let Some(last) = state.last_created_at {
                item.created_at = item.created_at.max(last);
            }
            state.last_created_at = Some(item.created_at);
            state.announcing.insert(item.id);
            insert_ordered(&mut state.items, item.clone());
            inner.persist(&mut state);
            state.items.len()
        };

        debug!(
            item_id = %item.id,
            operation_type = %item.operation_type,
            priority = item.priority,
            queue_size,
            "enqueued"
        );
        let id = item.id;
        inner.channel.emit(&QueueEvent::Queued { item, queue_size });

        inner.state.lock().announcing.remove(&id);
        inner.trigger_drain();
        Ok(id)
    }

    /// Runs a drain and waits for it.
    ///
    /// If a drain is already running, waits for that one instead of
    /// starting a second. Returns at once when offline.
    pub async fn process_queue(&self) {
        let started = {
            let mut state = self.inner.state.lock();
            self.inner.begin_drain(&mut state)
        };
        if started {
            Arc::clone(&self.inner).drain().await;
        } else {
            self.wait_idle().await;
        }
    }

    /// Resolves once no drain is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.draining_tx.subscribe();
        // the sender lives as long as `inner`, which we hold
        let _ = rx.wait_for(|draining| !*draining).await;
    }

    /// Current items in drain order.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.inner.state.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().items.is_empty()
    }

    /// Where a held item currently is. `None` once it left the queue.
    pub fn item_state(&self, id: ItemId) -> Option<ItemState> {
        self.inner.state.lock().state_of(id)
    }

    /// Removes every item, cancels pending retry timers, emits `Cleared`.
    ///
    /// An attempt already in flight is not interrupted; its outcome is ignored.
    pub fn clear(&self) {
        let queue_size = {
            let mut state = self.inner.state.lock();
            let dropped = state.items.len();
            state.items.clear();
            state.announcing.clear();
            for (_, token) in state.backing_off.drain() {
                token.cancel();
            }
            // whatever the unreadable slot held is cleared too
            state.restore_pending = false;
            self.inner.persist(&mut state);
            info!(dropped, "queue cleared");
            state.items.len()
        };
        self.inner
            .channel
            .emit(&QueueEvent::Cleared { queue_size });
    }

    /// Removes one item. Returns whether it was present.
    ///
    /// No event is emitted.
    pub fn remove(&self, id: ItemId) -> bool {
        let recovered = {
            let mut state = self.inner.state.lock();
            let Some(index) = state.items.iter().position(|i| i.id == id) else {
                return false;
            };
            state.items.remove(index);
            state.announcing.remove(&id);
            if let Some(token) = state.backing_off.remove(&id) {
                token.cancel();
            }
            let recovered = self.inner.persist(&mut state);
            debug!(item_id = %id, queue_size = state.items.len(), "item removed");
            recovered
        };
        if recovered > 0 {
            self.inner.trigger_drain();
        }
        true
    }

    /// Registers an observer for every subsequent event.
    pub fn subscribe(&self, listener: impl Fn(&QueueEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.channel.subscribe(listener);
        Subscription::new(id, &self.inner.channel)
    }

    pub fn is_online(&self) -> bool {
        self.inner.monitor.is_online()
    }

    /// Why stored data was discarded at startup, if it was.
    pub fn load_diagnostic(&self) -> Option<&str> {
        self.inner.load_diagnostic.as_deref()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock();
        QueueStatus {
            pending: state.items.len(),
            backing_off: state.backing_off.len(),
            in_flight: state.in_flight,
            online: self.inner.monitor.is_online(),
            draining: state.draining,
            listeners: self.inner.channel.len(),
        }
    }

    /// Stops monitoring, cancels timers and drops every listener.
    ///
    /// Persisted items stay in the store for the next instance. Idempotent.
    pub fn destroy(&self) {
        self.inner.monitor.stop();
        {
            let mut state = self.inner.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            for (_, token) in state.backing_off.drain() {
                token.cancel();
            }
            info!(pending = state.items.len(), "offline queue destroyed");
        }
        self.inner.channel.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }
}

impl Inner {
    /// Saves the list. Caller holds the state lock.
    ///
    /// While the slot is unreadable nothing is written. Once it can be read,
    /// its items are merged in first. Returns how many were merged.
    fn persist(&self, state: &mut State) -> usize {
        let mut recovered = 0;
        if state.restore_pending {
            match self.slot.recover() {
                Recovery::Restored(stored) => {
                    let before = state.items.len();
                    // stored items were queued first; in-memory copies win on id clashes
                    let held: HashSet<ItemId> = state.items.iter().map(|i| i.id).collect();
                    let mut merged: Vec<QueueItem> =
                        stored.into_iter().filter(|i| !held.contains(&i.id)).collect();
                    merged.append(&mut state.items);
                    let (items, _) = snapshot::sanitize(merged);
                    state.note_created(&items);
                    recovered = items.len().saturating_sub(before);
                    state.items = items;
                    state.restore_pending = false;
                    info!(recovered, queue_size = state.items.len(), "merged stored queue");
                }
                Recovery::Discarded(err) => {
                    warn!(error = %err, "stored queue unusable; overwriting");
                    state.restore_pending = false;
                }
                Recovery::Unreadable(err) => {
                    warn!(
                        queue_size = state.items.len(),
                        error = %err,
                        "queue slot still unreadable; keeping changes in memory"
                    );
                    return 0;
                }
            }
        }
        self.slot.save(&state.items);
        recovered
    }

    /// Claims the single drain slot. Caller holds the state lock.
    fn begin_drain(&self, state: &mut State) -> bool {
        if state.draining || state.destroyed {
            return false;
        }
        state.draining = true;
        self.draining_tx.send_replace(true);
        true
    }

    fn trigger_drain(self: &Arc<Self>) {
        let start = {
            let mut state = self.state.lock();
            self.monitor.is_online() && !state.items.is_empty() && self.begin_drain(&mut state)
        };
        if start {
            self.spawn_drain();
        }
    }

    fn transition(id: ItemId, from: ItemState, to: ItemState) {
        debug_assert!(from.can_transition_to(to), "illegal transition {from:?} -> {to:?}");
        debug!(item_id = %id, from = ?from, to = ?to, terminal = to.is_terminal(), "item state");
    }

    fn spawn_drain(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.runtime.spawn(inner.drain());
    }

    async fn drain(self: Arc<Self>) {
        debug!("drain started");
        let mut attempted = 0usize;

        loop {
            let next = {
                let mut guard = self.state.lock();
                let state = &mut *guard;
                let pick = if state.destroyed || !self.monitor.is_online() {
                    None
                } else {
                    state.next_runnable().cloned()
                };
                match pick {
                    Some(item) => {
                        Self::transition(item.id, ItemState::Queued, ItemState::Processing);
                        state.in_flight = Some(item.id);
                        Some((item, state.items.len()))
                    }
                    None => {
                        state.in_flight = None;
                        state.draining = false;
                        self.draining_tx.send_replace(false);
                        None
                    }
                }
            };

            let Some((item, queue_size)) = next else {
                break;
            };

            attempted += 1;
            self.channel.emit(&QueueEvent::Processing {
                item: item.clone(),
                queue_size,
            });

            let result = self.execute(&item).await;
            match self.settle(item, result) {
                Flow::Continue => {}
                // settle already released the drain slot
                Flow::Stop => break,
            }
        }

        debug!(attempted, "drain finished");
    }

    /// Runs the executor on its own task so a panic fails the attempt
    /// instead of wedging the drain.
    async fn execute(&self, item: &QueueItem) -> Result<(), ExecutorError> {
        let executor = Arc::clone(&self.executor);
        let owned = item.clone();
        match self
            .runtime
            .spawn(async move { executor.execute(&owned).await })
            .await
        {
            Ok(result) => result,
            Err(join_err) => {
                warn!(item_id = %item.id, error = %join_err, "executor task failed");
                Err(ExecutorError::transient(format!("executor task failed: {join_err}")))
            }
        }
    }

    fn settle(self: &Arc<Self>, item: QueueItem, result: Result<(), ExecutorError>) -> Flow {
        let id = item.id;
        match result {
            Ok(()) => {
                let removed = {
                    let mut state = self.state.lock();
                    state.in_flight = None;
                    match state.items.iter().position(|i| i.id == id) {
                        Some(index) => {
                            let done = state.items.remove(index);
                            Self::transition(id, ItemState::Processing, ItemState::Succeeded);
                            self.persist(&mut state);
                            Some((done, state.items.len()))
                        }
                        None => None,
                    }
                };
                match removed {
                    Some((item, queue_size)) => {
                        info!(item_id = %id, operation_type = %item.operation_type, queue_size, "delivered");
                        self.channel.emit(&QueueEvent::Success { item, queue_size });
                    }
                    None => debug!(item_id = %id, "item left the queue during its attempt; success ignored"),
                }
                Flow::Continue
            }
            Err(error) => self.settle_failure(id, error),
        }
    }

    fn settle_failure(self: &Arc<Self>, id: ItemId, error: ExecutorError) -> Flow {
        let event = {
            let mut state = self.state.lock();
            state.in_flight = None;
            let Some(index) = state.items.iter().position(|i| i.id == id) else {
                debug!(item_id = %id, error = %error, "item left the queue during its attempt; failure ignored");
                return Flow::Continue;
            };

            let decision = self.policy.on_failure(&mut state.items[index], &error);
            match decision {
                RetryDecision::Defer => {
                    Self::transition(id, ItemState::Processing, ItemState::Queued);
                    info!(item_id = %id, error = %error, "offline during attempt; pausing drain");
                    state.draining = false;
                    self.draining_tx.send_replace(false);
                    // the offline hook never touches `state`, so the lock may be held
                    self.monitor.observe_offline();
                    return Flow::Stop;
                }
                RetryDecision::Retry { delay } => {
                    let item = state.items[index].clone();
                    let token = self.schedule_release(id, delay);
                    state.backing_off.insert(id, token);
                    Self::transition(id, ItemState::Processing, ItemState::RetryScheduled);
                    self.persist(&mut state);
                    warn!(
                        item_id = %id,
                        retry_count = item.retry_count,
                        max_retries = item.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "attempt failed; retry scheduled"
                    );
                    QueueEvent::Retry {
                        item,
                        error,
                        delay,
                        queue_size: state.items.len(),
                    }
                }
                RetryDecision::GiveUp { reason } => {
                    let item = state.items.remove(index);
                    Self::transition(id, ItemState::Processing, ItemState::Failed);
                    self.persist(&mut state);
                    let reason = match reason {
                        GiveUpReason::RetriesExhausted => "retries exhausted",
                        GiveUpReason::NonRetryable => "non-retryable",
                    };
                    error!(
                        item_id = %id,
                        operation_type = %item.operation_type,
                        retry_count = item.retry_count,
                        reason,
                        error = %error,
                        "giving up on item"
                    );
                    QueueEvent::Error {
                        item,
                        error,
                        queue_size: state.items.len(),
                    }
                }
            }
        };

        self.channel.emit(&event);
        Flow::Continue
    }

    fn schedule_release(self: &Arc<Self>, id: ItemId, delay: Duration) -> CancelToken {
        let weak = Arc::downgrade(self);
        self.scheduler.after(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.release(id);
                }
            }),
        )
    }

    /// Backoff elapsed: the item becomes eligible again.
    fn release(self: &Arc<Self>, id: ItemId) {
        let released = self.state.lock().backing_off.remove(&id).is_some();
        if released {
            Self::transition(id, ItemState::RetryScheduled, ItemState::Queued);
            debug!(item_id = %id, "backoff elapsed");
            self.trigger_drain();
        }
    }
}

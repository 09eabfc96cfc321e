//! Connectivity monitor: believed online state + reconciliation poll.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::ports::ConnectivityProvider;

/// Called with the new state on every transition.
pub type TransitionHook = Arc<dyn Fn(bool) + Send + Sync>;

/// Where a state change was learned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Notification,
    Reconcile,
    Executor,
}

impl Source {
    fn as_str(self) -> &'static str {
        match self {
            Source::Notification => "notification",
            Source::Reconcile => "reconcile",
            Source::Executor => "executor",
        }
    }
}

/// Tracks the online flag that gates draining.
///
/// - Change notifications from the provider are applied immediately.
/// - Every `check_interval` the provider's authoritative state is compared
///   with the believed one and drift is corrected (missed notifications).
/// - Both paths call the transition hook the same way.
pub struct ConnectivityMonitor {
    online: Arc<AtomicBool>,
    hook: TransitionHook,
    shutdown_tx: watch::Sender<bool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    /// Spawns the monitoring task on `handle`.
    pub fn start(
        provider: Arc<dyn ConnectivityProvider>,
        check_interval: Duration,
        handle: &Handle,
        hook: TransitionHook,
    ) -> Self {
        // subscribe 前の変化を取りこぼさないよう、購読してから現在値を読む
        let changes = provider.subscribe();
        let online = Arc::new(AtomicBool::new(provider.is_online()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = MonitorTask {
            provider,
            online: Arc::clone(&online),
            hook: Arc::clone(&hook),
            check_interval,
        };
        let join = handle.spawn(task.run(Some(changes), shutdown_rx));

        Self {
            online,
            hook,
            shutdown_tx,
            join: Mutex::new(Some(join)),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Records an offline observation made outside the provider
    /// (the executor saw the network down). The next poll corrects it if wrong.
    pub fn observe_offline(&self) {
        apply(&self.online, &self.hook, false, Source::Executor);
    }

    pub fn is_running(&self) -> bool {
        self.join
            .lock()
            .as_ref()
            .is_some_and(|join| !join.is_finished())
    }

    /// Stops the poll and detaches from the provider. Idempotent.
    pub fn stop(&self) {
        // ignore send error: the task may already be gone
        let _ = self.shutdown_tx.send(true);
        if let Some(join) = self.join.lock().take() {
            join.abort();
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct MonitorTask {
    provider: Arc<dyn ConnectivityProvider>,
    online: Arc<AtomicBool>,
    hook: TransitionHook,
    check_interval: Duration,
}

impl MonitorTask {
    async fn run(
        self,
        mut changes: Option<watch::Receiver<bool>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                res = shutdown_rx.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                change = next_change(&mut changes) => match change {
                    Some(state) => apply(&self.online, &self.hook, state, Source::Notification),
                    None => {
                        debug!("connectivity notifications closed; relying on reconciliation poll");
                        changes = None;
                    }
                },
                _ = ticker.tick() => {
                    let actual = self.provider.is_online();
                    apply(&self.online, &self.hook, actual, Source::Reconcile);
                }
            }
        }
        debug!("connectivity monitor stopped");
    }
}

async fn next_change(changes: &mut Option<watch::Receiver<bool>>) -> Option<bool> {
    match changes {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

fn apply(online: &AtomicBool, hook: &TransitionHook, state: bool, source: Source) {
    let previous = online.swap(state, Ordering::SeqCst);
    if previous == state {
        return;
    }
    info!(online = state, source = source.as_str(), "connectivity changed");
    hook(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::ManualConnectivity;

    fn recording_hook() -> (TransitionHook, Arc<Mutex<Vec<bool>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        (Arc::new(move |online| s.lock().push(online)), seen)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn follows_notifications() {
        let provider = Arc::new(ManualConnectivity::new(false));
        let (hook, seen) = recording_hook();
        let monitor =
            ConnectivityMonitor::start(provider.clone(), Duration::from_secs(60), &Handle::current(), hook);

        assert!(!monitor.is_online());

        provider.set_online(true);
        settle().await;
        assert!(monitor.is_online());

        provider.set_online(false);
        settle().await;
        assert!(!monitor.is_online());
        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn reconciliation_corrects_missed_transition() {
        let provider = Arc::new(ManualConnectivity::new(false));
        let (hook, seen) = recording_hook();
        let monitor =
            ConnectivityMonitor::start(provider.clone(), Duration::from_secs(10), &Handle::current(), hook);

        provider.set_online_silently(true);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!monitor.is_online(), "no poll has run yet");

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(monitor.is_online());
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn executor_observation_is_corrected_by_poll() {
        let provider = Arc::new(ManualConnectivity::new(true));
        let (hook, seen) = recording_hook();
        let monitor =
            ConnectivityMonitor::start(provider.clone(), Duration::from_secs(10), &Handle::current(), hook);

        monitor.observe_offline();
        assert!(!monitor.is_online());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(monitor.is_online());
        assert_eq!(*seen.lock(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_task() {
        let provider = Arc::new(ManualConnectivity::new(false));
        let (hook, seen) = recording_hook();
        let monitor =
            ConnectivityMonitor::start(provider.clone(), Duration::from_secs(1), &Handle::current(), hook);
        settle().await;
        assert!(monitor.is_running());

        monitor.stop();
        settle().await;
        assert!(!monitor.is_running());

        provider.set_online(true);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(seen.lock().is_empty());
        assert!(!monitor.is_online());
    }
}

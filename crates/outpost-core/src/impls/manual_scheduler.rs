//! ManualScheduler - 仮想時計で動く Scheduler
//!
//! 実時間を待たずにバックオフを検証するためのものです。
//! `advance` を呼んだ分だけ時計が進み、期限が来た予約を期限順に発火します。

use std::time::Duration;

use parking_lot::Mutex;

use crate::ports::{CancelToken, Scheduler, TimerCallback};

struct Pending {
    due: Duration,
    seq: u64,
    token: CancelToken,
    callback: TimerCallback,
}

#[derive(Default)]
struct State {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
    requested: Vec<Duration>,
}

#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<State>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 仮想時計の現在値（開始からの経過）
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// 時計を進めて、期限の来た予約を発火する。発火した数を返す
    ///
    /// コールバックはロックの外で呼ぶので、中から `after` してもよい。
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let mut state = self.state.lock();
            state.now + by
        };

        let mut fired = 0;
        loop {
            let next = {
                let mut state = self.state.lock();
                state.pending.retain(|p| !p.token.is_cancelled());
                let idx = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(idx, _)| idx);
                match idx {
                    Some(idx) => {
                        let pending = state.pending.swap_remove(idx);
                        state.now = state.now.max(pending.due);
                        Some(pending)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            let Some(pending) = next else { break };
            if !pending.token.is_cancelled() {
                (pending.callback)();
                fired += 1;
            }
        }
        fired
    }

    /// キャンセルされていない予約の数
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .pending
            .iter()
            .filter(|p| !p.token.is_cancelled())
            .count()
    }

    /// 次の発火までの残り時間
    pub fn next_due_in(&self) -> Option<Duration> {
        let state = self.state.lock();
        state
            .pending
            .iter()
            .filter(|p| !p.token.is_cancelled())
            .map(|p| p.due.saturating_sub(state.now))
            .min()
    }

    /// これまでに `after` へ渡された delay（呼ばれた順）
    pub fn requested_delays(&self) -> Vec<Duration> {
        self.state.lock().requested.clone()
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, callback: TimerCallback) -> CancelToken {
        let token = CancelToken::new();
        let mut state = self.state.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.requested.push(delay);
        state.pending.push(Pending {
            due,
            seq,
            token: token.clone(),
            callback,
        });
        token
    }
}

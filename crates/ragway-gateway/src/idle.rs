//! Dual-deadline stream liveness control.
//!
//! An [`IdleTracker`] holds the cumulative idle budget for a request; it is
//! shared across attempts. Each attempt owns an [`IdleTimer`] armed with the
//! per-idle window. Every reset charges the observed idle gap against the
//! tracker and re-arms; an expiry charges the full per-idle window. Whichever
//! charge empties the tracker turns the timeout reason into `total`, and in
//! every timeout case the timer cancels its context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    PerIdle,
    Total,
    Cancelled,
}

impl IdleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdleReason::PerIdle => "per_idle",
            IdleReason::Total => "total",
            IdleReason::Cancelled => "cancelled",
        }
    }
}

/// Cumulative idle budget, shared across retries of one request.
pub struct IdleTracker {
    initial: Duration,
    remaining: Mutex<Duration>,
}

impl IdleTracker {
    pub fn new(initial: Duration) -> Arc<Self> {
        Arc::new(Self {
            initial,
            remaining: Mutex::new(initial),
        })
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn remaining(&self) -> Duration {
        *self.remaining.lock().unwrap()
    }

    /// Charge idle time against the budget; returns what is left.
    fn consume(&self, amount: Duration) -> Duration {
        let mut remaining = self.remaining.lock().unwrap();
        *remaining = remaining.saturating_sub(amount);
        *remaining
    }
}

struct TimerState {
    reason: Option<IdleReason>,
    stopped: bool,
    armed_at: Instant,
}

struct TimerInner {
    per_idle: Duration,
    tracker: Arc<IdleTracker>,
    state: Mutex<TimerState>,
    reset_count: AtomicU64,
    rearm: Notify,
    /// Stops the watcher without cancelling the stream context.
    stop: CancellationToken,
}

/// One attempt's idle timer. Owns a child of the request context and
/// cancels it on timeout.
pub struct IdleTimer {
    token: CancellationToken,
    inner: Arc<TimerInner>,
}

impl IdleTimer {
    /// Arm a timer against `parent`. Fails fast when the tracker is already
    /// exhausted: reason becomes `total` and the context is cancelled
    /// before any work runs. `per_idle` is clamped to the tracker's initial
    /// budget.
    pub fn new(
        parent: &CancellationToken,
        per_idle: Duration,
        tracker: Arc<IdleTracker>,
    ) -> Self {
        let token = parent.child_token();
        let per_idle = per_idle.min(tracker.initial());
        let inner = Arc::new(TimerInner {
            per_idle,
            tracker,
            state: Mutex::new(TimerState {
                reason: None,
                stopped: false,
                armed_at: Instant::now(),
            }),
            reset_count: AtomicU64::new(0),
            rearm: Notify::new(),
            stop: CancellationToken::new(),
        });
        let timer = Self {
            token: token.clone(),
            inner: inner.clone(),
        };

        if timer.inner.tracker.remaining().is_zero() {
            inner.state.lock().unwrap().reason = Some(IdleReason::Total);
            token.cancel();
            return timer;
        }

        let parent = parent.clone();
        tokio::spawn(watch(inner, token, parent));
        timer
    }

    /// Context cancelled on timeout; hand this to the stream driver.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Data arrived: charge the elapsed idle window, re-arm to the per-idle
    /// window. Cheap and safe to call concurrently; a no-op once the timer
    /// is stopped or has fired. A reset that empties the budget is itself a
    /// `total` timeout.
    pub fn reset(&self) {
        let exhausted = {
            let mut state = self.inner.state.lock().unwrap();
            if state.stopped || state.reason.is_some() {
                return;
            }
            let elapsed = state.armed_at.elapsed();
            state.armed_at = Instant::now();
            self.inner.reset_count.fetch_add(1, Ordering::Relaxed);
            let remaining = self.inner.tracker.consume(elapsed);
            if remaining.is_zero() {
                state.reason = Some(IdleReason::Total);
                true
            } else {
                false
            }
        };
        if exhausted {
            debug!("idle budget exhausted on reset");
            self.inner.stop.cancel();
            self.token.cancel();
        } else {
            self.inner.rearm.notify_one();
        }
    }

    /// Prevent any further timeout. Idempotent.
    pub fn stop(&self) {
        self.inner.state.lock().unwrap().stopped = true;
        self.inner.stop.cancel();
    }

    pub fn reason(&self) -> Option<IdleReason> {
        self.inner.state.lock().unwrap().reason
    }

    pub fn reset_count(&self) -> u64 {
        self.inner.reset_count.load(Ordering::Relaxed)
    }
}

async fn watch(inner: Arc<TimerInner>, token: CancellationToken, parent: CancellationToken) {
    loop {
        let rearmed = inner.rearm.notified();
        tokio::pin!(rearmed);
        tokio::select! {
            _ = parent.cancelled() => {
                let mut state = inner.state.lock().unwrap();
                if state.reason.is_none() && !state.stopped {
                    state.reason = Some(IdleReason::Cancelled);
                }
                return;
            }
            _ = inner.stop.cancelled() => return,
            _ = &mut rearmed => continue,
            _ = tokio::time::sleep(inner.per_idle) => {
                let remaining = inner.tracker.consume(inner.per_idle);
                let reason = if remaining.is_zero() {
                    IdleReason::Total
                } else {
                    IdleReason::PerIdle
                };
                {
                    let mut state = inner.state.lock().unwrap();
                    if state.stopped || state.reason.is_some() {
                        return;
                    }
                    state.reason = Some(reason);
                }
                debug!(reason = reason.as_str(), "idle timer expired");
                token.cancel();
                return;
            }
        }
    }
}

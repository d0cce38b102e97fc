//! Shared fire-and-forget executor for work that must not extend a
//! request's latency (guideline compression, metrics reporting).
//!
//! Every task gets a hard timeout. Shutdown drains: tasks already running
//! are allowed to finish (bounded by their timeout), nothing new starts.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::warn;

pub struct BackgroundTasks {
    tracker: TaskTracker,
    token: CancellationToken,
    task_timeout: Duration,
}

impl BackgroundTasks {
    pub fn new(task_timeout: Duration) -> Self {
        Self {
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
            task_timeout,
        }
    }

    /// Submit a task. Dropped silently after shutdown began.
    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            warn!(task = name, "background executor closed, task dropped");
            return;
        }
        let timeout = self.task_timeout;
        let token = self.token.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                res = tokio::time::timeout(timeout, fut) => {
                    if res.is_err() {
                        warn!(task = name, timeout_ms = timeout.as_millis() as u64,
                            "background task timed out");
                    }
                }
            }
        });
    }

    /// Stop accepting tasks and wait for in-flight ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Abort everything immediately (used by tests and hard shutdown).
    pub fn abort(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn shutdown_waits_for_spawned_work() {
        let tasks = BackgroundTasks::new(Duration::from_secs(5));
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        tasks.spawn("test", async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });
        tasks.shutdown().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tasks_after_shutdown_are_dropped() {
        let tasks = BackgroundTasks::new(Duration::from_secs(5));
        tasks.shutdown().await;
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        tasks.spawn("late", async move {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn overrunning_task_is_cut_at_timeout() {
        let tasks = BackgroundTasks::new(Duration::from_millis(10));
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        tasks.spawn("slow", async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
        });
        tasks.shutdown().await;
        assert!(!done.load(Ordering::SeqCst));
    }
}

//! Asynchronous journal of finished chat logs.
//!
//! `log_async` enqueues without blocking; when the queue is full the record
//! is written synchronously instead, so the request path never waits on
//! spool back-pressure. A single consumer task drains the queue into
//! `<root>/temp/`, and drains whatever is left when shutdown is signalled.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::chatlog::ChatLog;
use crate::files::temp_file_name;

pub struct ChatLogSpool {
    tx: mpsc::Sender<Box<ChatLog>>,
    inner: Arc<SpoolInner>,
    consumer: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

struct SpoolInner {
    temp_dir: PathBuf,
    /// Serialises file writes between the consumer and full-queue fallbacks.
    write_lock: Mutex<()>,
    first_enqueue: Notify,
    enqueued_once: AtomicBool,
}

impl ChatLogSpool {
    pub fn new(log_root: impl AsRef<Path>, queue_size: usize, shutdown: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let inner = Arc::new(SpoolInner {
            temp_dir: log_root.as_ref().join("temp"),
            write_lock: Mutex::new(()),
            first_enqueue: Notify::new(),
            enqueued_once: AtomicBool::new(false),
        });
        let consumer = tokio::spawn(consume(inner.clone(), rx, shutdown));
        Self {
            tx,
            inner,
            consumer: Mutex::new(Some(consumer)),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.inner.temp_dir
    }

    /// Hand a finished record to the spool. Never blocks on queue capacity:
    /// a full queue falls back to an inline write.
    pub async fn log_async(&self, record: Box<ChatLog>) {
        self.mark_first_enqueue();
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                warn!("chat-log queue full, writing synchronously");
                self.inner.write_record(&record).await;
            }
            Err(TrySendError::Closed(record)) => {
                warn!("chat-log consumer gone, writing synchronously");
                self.inner.write_record(&record).await;
            }
        }
    }

    /// Resolves once the first record has been enqueued; the sweep loop
    /// starts only after this.
    pub async fn wait_first_enqueue(&self) {
        if self.inner.enqueued_once.load(Ordering::Acquire) {
            return;
        }
        let notified = self.inner.first_enqueue.notified();
        if self.inner.enqueued_once.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    fn mark_first_enqueue(&self) {
        if !self.inner.enqueued_once.swap(true, Ordering::AcqRel) {
            self.inner.first_enqueue.notify_waiters();
        }
    }

    /// Wait for the consumer to drain and exit. Call after cancelling the
    /// shutdown token.
    pub async fn join(&self) {
        if let Some(handle) = self.consumer.lock().await.take() {
            let _ = handle.await;
        }
    }
}

impl SpoolInner {
    async fn write_record(&self, record: &ChatLog) {
        let _guard = self.write_lock.lock().await;
        if let Err(e) = tokio::fs::create_dir_all(&self.temp_dir).await {
            error!(error = %e, dir = %self.temp_dir.display(), "cannot create temp dir");
            return;
        }
        let name = temp_file_name(&record.identity.user_name, chrono::Local::now());
        let path = self.temp_dir.join(name);
        let body = match serde_json::to_string(record) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                error!(error = %e, "chat log serialization failed");
                return;
            }
        };
        match tokio::fs::write(&path, body).await {
            Ok(()) => debug!(path = %path.display(), "chat log spooled"),
            Err(e) => error!(error = %e, path = %path.display(), "chat log write failed"),
        }
    }
}

async fn consume(
    inner: Arc<SpoolInner>,
    mut rx: mpsc::Receiver<Box<ChatLog>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(record) => inner.write_record(&record).await,
                None => break,
            },
            _ = shutdown.cancelled() => {
                // Drain whatever is already queued, then exit.
                while let Ok(record) = rx.try_recv() {
                    inner.write_record(&record).await;
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatlog::RequestParams;
    use ragway_core::identity::Identity;

    fn record(user: &str) -> Box<ChatLog> {
        let mut identity = Identity::default();
        identity.user_name = user.to_string();
        Box::new(ChatLog::new(identity, "m", RequestParams::default()))
    }

    fn temp_files(dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn enqueued_record_lands_in_temp_dir() {
        let root = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let spool = ChatLogSpool::new(root.path(), 8, token.clone());

        spool.log_async(record("alice")).await;
        token.cancel();
        spool.join().await;

        let files = temp_files(&root.path().join("temp"));
        assert_eq!(files.len(), 1);
        let body = std::fs::read_to_string(&files[0]).unwrap();
        assert!(body.ends_with('\n'));
        let parsed: ChatLog = serde_json::from_str(body.trim_end()).unwrap();
        assert_eq!(parsed.identity.user_name, "alice");
    }

    #[tokio::test]
    async fn shutdown_drains_queued_records() {
        let root = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let spool = ChatLogSpool::new(root.path(), 16, token.clone());

        for i in 0..5 {
            spool.log_async(record(&format!("user{i}"))).await;
        }
        token.cancel();
        spool.join().await;

        assert_eq!(temp_files(&root.path().join("temp")).len(), 5);
    }

    #[tokio::test]
    async fn wait_first_enqueue_resolves_after_enqueue() {
        let root = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let spool = Arc::new(ChatLogSpool::new(root.path(), 8, token.clone()));

        let waiter = {
            let spool = spool.clone();
            tokio::spawn(async move { spool.wait_first_enqueue().await })
        };
        // Not resolved until something is enqueued.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        spool.log_async(record("bob")).await;
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter resolves")
            .unwrap();

        token.cancel();
        spool.join().await;
    }
}

//! Periodic sweep over spooled chat logs.
//!
//! For each temp file: parse → classify (when unclassified) → ship to the
//! log sink → record metrics → promote to permanent storage → delete.
//! A record is shipped at most once per sweep, stored permanently only
//! after a successful ship, and removed from temp only after permanent
//! storage completes. Files are visited in directory-listing order, which
//! is deliberately unspecified across sweeps.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ragway_core::message::Message;
use ragway_core::prompts::{
    classify_instruction, is_known_category, CATEGORY_EXTRA, CATEGORY_UNKNOWN, CLASSIFY_PROMPT,
};
use ragway_core::{RagwayError, Result};
use ragway_llm::LlmClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chatlog::ChatLog;
use crate::files::permanent_file_path;
use crate::metrics;
use crate::sink::LogSinkClient;
use crate::spool::ChatLogSpool;

/// Classification runs on a context independent of any request, capped
/// hard so one stuck call cannot stall the sweep.
const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LogProcessor {
    log_root: PathBuf,
    scan_interval: Duration,
    classifier: Option<Arc<LlmClient>>,
    classifier_auth: String,
    sink: Option<LogSinkClient>,
}

impl LogProcessor {
    pub fn new(
        log_root: impl Into<PathBuf>,
        scan_interval: Duration,
        classifier: Option<Arc<LlmClient>>,
        classifier_auth: impl Into<String>,
        sink: Option<LogSinkClient>,
    ) -> Self {
        Self {
            log_root: log_root.into(),
            scan_interval,
            classifier,
            classifier_auth: classifier_auth.into(),
            sink,
        }
    }

    /// Spawn the sweep loop. It idles until the spool sees its first
    /// record, then sweeps every `scan_interval`.
    pub fn start(
        self: Arc<Self>,
        spool: Arc<ChatLogSpool>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = spool.wait_first_enqueue() => {}
                _ = shutdown.cancelled() => return,
            }
            info!(interval_secs = self.scan_interval.as_secs(), "log sweep armed");
            let mut interval = tokio::time::interval(self.scan_interval);
            interval.tick().await; // consume the immediate first tick
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => self.sweep().await,
                }
            }
        })
    }

    /// One pass over the temp directory.
    pub async fn sweep(&self) {
        let temp_dir = self.log_root.join("temp");
        let entries = match std::fs::read_dir(&temp_dir) {
            Ok(entries) => entries,
            Err(_) => return, // nothing spooled yet
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_log = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("log") | Some("json")
            );
            if !is_log {
                continue;
            }
            self.process_file(&path).await;
        }
    }

    async fn process_file(&self, path: &Path) {
        let body = match tokio::fs::read_to_string(path).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "temp file unreadable, skipping");
                return;
            }
        };
        let mut record: ChatLog = match serde_json::from_str(body.trim_end()) {
            Ok(record) => record,
            Err(e) => {
                // Left in place for operator inspection.
                warn!(error = %e, path = %path.display(), "temp file unparseable, leaving");
                return;
            }
        };

        if record.category.as_deref().unwrap_or_default().is_empty() {
            match self.classify(&record).await {
                Ok(category) => {
                    record.category = Some(category);
                    if let Ok(json) = serde_json::to_string(&record) {
                        if let Err(e) = tokio::fs::write(path, format!("{json}\n")).await {
                            warn!(error = %e, path = %path.display(),
                                "category rewrite failed, continuing in memory");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "classification failed");
                    metrics::record_error(&record.identity, &record.model, e.error_type());
                    record.category = Some(CATEGORY_UNKNOWN.to_string());
                }
            }
        }

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "record re-serialization failed");
                return;
            }
        };

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.ship(&record, &line).await {
                warn!(error = %e, path = %path.display(),
                    "log sink rejected record, keeping temp file");
                return;
            }
        }

        metrics::record_chat_log(&record);

        let dest = permanent_file_path(
            &self.log_root,
            &record.identity.user_name,
            &record.identity.request_id,
            chrono::Local::now(),
        );
        if let Some(parent) = dest.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(error = %e, "permanent dir creation failed, keeping temp file");
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&dest, format!("{line}\n")).await {
            warn!(error = %e, dest = %dest.display(), "promote failed, keeping temp file");
            return;
        }

        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(error = %e, path = %path.display(), "temp file removal failed");
            return;
        }
        debug!(dest = %dest.display(), "chat log promoted");
    }

    async fn classify(&self, record: &ChatLog) -> Result<String> {
        let Some(llm) = &self.classifier else {
            return Err(RagwayError::Classification(
                "no classifier configured".to_string(),
            ));
        };
        let mut messages = record.user_messages();
        messages.push(Message::user(classify_instruction()));

        let call = llm.generate_content(&self.classifier_auth, CLASSIFY_PROMPT, &messages);
        let text = tokio::time::timeout(CLASSIFY_TIMEOUT, call)
            .await
            .map_err(|_| RagwayError::Classification("classification timed out".to_string()))?
            .map_err(|e| RagwayError::Classification(e.to_string()))?;

        Ok(validate_category(&text))
    }
}

/// Exact-match validation against the closed set; anything else is `extra`.
fn validate_category(text: &str) -> String {
    let candidate = text.trim();
    if is_known_category(candidate) {
        candidate.to_string()
    } else {
        CATEGORY_EXTRA.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatlog::RequestParams;
    use ragway_core::identity::Identity;

    fn processor(root: &Path) -> LogProcessor {
        LogProcessor::new(root, Duration::from_secs(60), None, "", None)
    }

    fn spool_record(root: &Path, name: &str, record: &ChatLog) -> PathBuf {
        let temp = root.join("temp");
        std::fs::create_dir_all(&temp).unwrap();
        let path = temp.join(name);
        let json = serde_json::to_string(record).unwrap();
        std::fs::write(&path, format!("{json}\n")).unwrap();
        path
    }

    fn classified_record(user: &str) -> ChatLog {
        let mut identity = Identity::default();
        identity.user_name = user.to_string();
        identity.request_id = "req-1".to_string();
        let mut record = ChatLog::new(identity, "m", RequestParams::default());
        record.category = Some("BugFixing".to_string());
        record
    }

    #[test]
    fn category_validation_is_exact_match() {
        assert_eq!(validate_category("BugFixing"), "BugFixing");
        assert_eq!(validate_category("  BugFixing \n"), "BugFixing");
        assert_eq!(validate_category("bugfixing"), CATEGORY_EXTRA);
        assert_eq!(validate_category("Something else"), CATEGORY_EXTRA);
        assert_eq!(validate_category(""), CATEGORY_EXTRA);
    }

    #[tokio::test]
    async fn sweep_promotes_and_clears_temp() {
        let root = tempfile::tempdir().unwrap();
        let record = classified_record("alice");
        spool_record(root.path(), "a.log", &record);

        processor(root.path()).sweep().await;

        let temp_left: Vec<_> = std::fs::read_dir(root.path().join("temp"))
            .unwrap()
            .flatten()
            .collect();
        assert!(temp_left.is_empty(), "temp should be empty after sweep");

        // One promoted file somewhere under <root>/<yyyy-mm>/<dd>/alice/.
        let mut promoted = Vec::new();
        for month in std::fs::read_dir(root.path()).unwrap().flatten() {
            if month.path().file_name().is_some_and(|n| n == "temp") {
                continue;
            }
            for day in std::fs::read_dir(month.path()).unwrap().flatten() {
                for user in std::fs::read_dir(day.path()).unwrap().flatten() {
                    assert_eq!(user.file_name(), "alice");
                    for f in std::fs::read_dir(user.path()).unwrap().flatten() {
                        promoted.push(f.path());
                    }
                }
            }
        }
        assert_eq!(promoted.len(), 1);
        let name = promoted[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.contains("_req-1_"));
        let body = std::fs::read_to_string(&promoted[0]).unwrap();
        let parsed: ChatLog = serde_json::from_str(body.trim_end()).unwrap();
        assert_eq!(parsed.category.as_deref(), Some("BugFixing"));
    }

    #[tokio::test]
    async fn unparseable_file_is_left_in_place() {
        let root = tempfile::tempdir().unwrap();
        let temp = root.path().join("temp");
        std::fs::create_dir_all(&temp).unwrap();
        std::fs::write(temp.join("broken.log"), "not json\n").unwrap();

        processor(root.path()).sweep().await;

        assert!(temp.join("broken.log").exists());
    }

    #[tokio::test]
    async fn non_log_extensions_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let temp = root.path().join("temp");
        std::fs::create_dir_all(&temp).unwrap();
        std::fs::write(temp.join("notes.txt"), "keep me\n").unwrap();

        processor(root.path()).sweep().await;

        assert!(temp.join("notes.txt").exists());
    }

    #[tokio::test]
    async fn unclassified_record_without_classifier_becomes_unknown() {
        let root = tempfile::tempdir().unwrap();
        let mut record = classified_record("bob");
        record.category = None;
        spool_record(root.path(), "b.log", &record);

        processor(root.path()).sweep().await;

        let mut found = false;
        for month in std::fs::read_dir(root.path()).unwrap().flatten() {
            if month.path().file_name().is_some_and(|n| n == "temp") {
                continue;
            }
            for day in std::fs::read_dir(month.path()).unwrap().flatten() {
                for user in std::fs::read_dir(day.path()).unwrap().flatten() {
                    for f in std::fs::read_dir(user.path()).unwrap().flatten() {
                        let body = std::fs::read_to_string(f.path()).unwrap();
                        let parsed: ChatLog = serde_json::from_str(body.trim_end()).unwrap();
                        assert_eq!(parsed.category.as_deref(), Some(CATEGORY_UNKNOWN));
                        found = true;
                    }
                }
            }
        }
        assert!(found);
    }
}

//! System-prompt guideline compression.
//!
//! The system prompt splits at a configured marker into a per-request
//! prefix and a stable guidelines tail. The tail is content-addressed: a
//! cache hit rewrites this request's system prompt; a miss leaves it
//! untouched and compresses the tail in the background so future requests
//! benefit. The background call never extends request latency and its
//! errors are swallowed after logging.

use std::sync::Arc;

use async_trait::async_trait;
use ragway_core::message::{Message, MessageContent};
use ragway_core::prompts::SYSTEM_SUMMARY_PROMPT;
use ragway_llm::LlmClient;
use tracing::{debug, warn};

use crate::background::BackgroundTasks;
use crate::cache::{content_hash, SystemPromptCache};
use crate::msg::PromptMsg;
use crate::node::PromptNode;
use crate::recorder::Recorder;

pub struct GuidelineCompressionNode {
    cache: Arc<SystemPromptCache>,
    llm: Arc<LlmClient>,
    background: Arc<BackgroundTasks>,
    splitter: String,
    /// Key for the summary model; falls back to the forwarded client token.
    api_key: Option<String>,
}

impl GuidelineCompressionNode {
    pub fn new(
        cache: Arc<SystemPromptCache>,
        llm: Arc<LlmClient>,
        background: Arc<BackgroundTasks>,
        splitter: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            cache,
            llm,
            background,
            splitter,
            api_key,
        }
    }
}

#[async_trait]
impl PromptNode for GuidelineCompressionNode {
    fn name(&self) -> &'static str {
        "guideline_compression"
    }

    async fn run(&self, msg: &mut PromptMsg, recorder: &mut Recorder) {
        let Some(system) = msg.system_msg.as_ref() else {
            return;
        };
        // Only plain-string system prompts carry a guidelines tail.
        let MessageContent::Text(content) = &system.content else {
            return;
        };
        let Some((prefix, tail)) = split_at_marker(content, &self.splitter) else {
            return;
        };

        let key = content_hash(tail);
        if let Some(compressed) = self.cache.get(&key) {
            debug!(key = %key, "guideline cache hit");
            let rewritten = format!("{prefix}{compressed}");
            msg.system_msg = Some(Message::system(rewritten));
            recorder.prompt_processed = true;
            return;
        }

        // Miss: this request keeps the original prompt; compress for the
        // next one.
        let llm = self.llm.clone();
        let cache = self.cache.clone();
        let tail = tail.to_string();
        let auth = self
            .api_key
            .clone()
            .unwrap_or_else(|| msg.identity.auth_token.clone());
        self.background.spawn("guideline_compression", async move {
            match llm
                .generate_content(&auth, SYSTEM_SUMMARY_PROMPT, &[Message::user(tail.clone())])
                .await
            {
                Ok(compressed) if !compressed.trim().is_empty() => {
                    cache.set(content_hash(&tail), compressed);
                }
                Ok(_) => warn!("guideline compression returned empty text, not cached"),
                Err(e) => warn!(error = %e, "guideline compression failed"),
            }
        });
    }
}

/// Split at the first occurrence of the marker. The tail includes the
/// marker itself, so `prefix + tail == content`.
pub(crate) fn split_at_marker<'a>(content: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    content.find(marker).map(|idx| content.split_at(idx))
}

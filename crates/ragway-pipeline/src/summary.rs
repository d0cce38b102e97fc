//! User-history compression node.
//!
//! When the user side of the conversation exceeds the token threshold, the
//! older turns are summarised by the cheap model and replaced with a single
//! synthetic assistant message. The recent window and the last user message
//! always survive verbatim.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use ragway_core::message::Message;
use ragway_core::prompts::{USER_SUMMARY_INSTRUCTION, USER_SUMMARY_PROMPT};
use ragway_core::tokenizer::Tokenizer;
use ragway_llm::LlmClient;
use tracing::{info, warn};

use crate::msg::PromptMsg;
use crate::node::PromptNode;
use crate::recorder::Recorder;

/// Headroom for the summary instruction and the model's response.
const SUMMARY_RESERVE_TOKENS: usize = 5000;

pub struct UserHistoryNode {
    llm: Arc<LlmClient>,
    tokenizer: Arc<Tokenizer>,
    token_threshold: usize,
    summary_model_token_threshold: usize,
    /// Key for the summary model; falls back to the forwarded client token.
    api_key: Option<String>,
}

impl UserHistoryNode {
    pub fn new(
        llm: Arc<LlmClient>,
        tokenizer: Arc<Tokenizer>,
        token_threshold: usize,
        summary_model_token_threshold: usize,
        api_key: Option<String>,
    ) -> Self {
        Self {
            llm,
            tokenizer,
            token_threshold,
            summary_model_token_threshold,
            api_key,
        }
    }
}

#[async_trait]
impl PromptNode for UserHistoryNode {
    fn name(&self) -> &'static str {
        "user_history_compression"
    }

    async fn run(&self, msg: &mut PromptMsg, recorder: &mut Recorder) {
        let user_tokens = self.tokenizer.count_messages_tokens(&msg.user_messages());
        if user_tokens <= self.token_threshold {
            return;
        }

        let semantic_tokens = self.tokenizer.count_tokens(&msg.semantic_context);
        let trimmed = trim_to_budget(
            msg.older_user_msgs.clone(),
            semantic_tokens,
            self.summary_model_token_threshold,
            &self.tokenizer,
        );

        let mut request: Vec<Message> = trimmed.into_iter().filter(|m| !m.is_system()).collect();
        if !msg.semantic_context.is_empty() {
            request.push(Message::assistant(format!(
                "semanticContext: {}",
                msg.semantic_context
            )));
        }
        request.push(Message::user(USER_SUMMARY_INSTRUCTION));

        let auth = self
            .api_key
            .clone()
            .unwrap_or_else(|| msg.identity.auth_token.clone());

        let started = Instant::now();
        let result = self
            .llm
            .generate_content(&auth, USER_SUMMARY_PROMPT, &request)
            .await;
        recorder.summary_latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(summary) => {
                info!(
                    user_tokens,
                    summary_chars = summary.len(),
                    "older user history compressed"
                );
                msg.older_user_msgs = vec![Message::assistant(summary.clone())];
                recorder.user_prompt_compressed = true;
                recorder.compressed_prompt = summary;
                recorder.prompt_processed = true;
            }
            Err(e) => {
                let e = ragway_core::RagwayError::Summary(e.to_string());
                warn!(error = %e, "history summary failed, passing through");
                recorder.summary_error = Some(e.to_string());
            }
        }
    }
}

/// Drop messages from the front until the summary request fits the summary
/// model's window. Stops when the slice is empty even if still over budget.
pub(crate) fn trim_to_budget(
    mut slice: Vec<Message>,
    semantic_tokens: usize,
    budget: usize,
    tokenizer: &Tokenizer,
) -> Vec<Message> {
    while !slice.is_empty()
        && semantic_tokens + tokenizer.count_messages_tokens(&slice) + SUMMARY_RESERVE_TOKENS
            > budget
    {
        slice.remove(0);
    }
    slice
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::PromptMsg;
    use crate::recorder::Recorder;
    use ragway_core::identity::Identity;
    use std::time::Duration;

    #[tokio::test]
    async fn node_passes_through_below_threshold() {
        let node = UserHistoryNode::new(
            Arc::new(
                LlmClient::new(
                    "http://llm",
                    "/v1/chat/completions",
                    "small",
                    Duration::from_secs(5),
                )
                .unwrap(),
            ),
            Arc::new(Tokenizer::approximate()),
            1000,
            28_000,
            None,
        );
        let input = vec![
            Message::system("s"),
            Message::user("short"),
            Message::user("query"),
        ];
        let mut msg = PromptMsg::split(input.clone(), 1, Arc::new(Identity::default()));
        let mut recorder = Recorder::default();
        node.run(&mut msg, &mut recorder).await;

        assert_eq!(msg.reassemble(), input);
        assert!(!recorder.user_prompt_compressed);
        assert!(recorder.summary_error.is_none());
        assert_eq!(recorder.summary_latency_ms, 0);
    }

    #[test]
    fn trim_keeps_slice_that_fits() {
        let tokenizer = Tokenizer::approximate();
        let slice = vec![Message::user("abcd"), Message::user("efgh")];
        // 2 * (1 + 4) + 5000 = 5010 <= 6000
        let kept = trim_to_budget(slice.clone(), 0, 6000, &tokenizer);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn trim_drops_from_the_front() {
        let tokenizer = Tokenizer::approximate();
        // each message: 40/4 + 4 = 14 tokens; 8 messages = 112 tokens
        let slice: Vec<Message> = (0..8)
            .map(|i| Message::user(format!("{:040}", i)))
            .collect();
        // budget 5100 leaves 100 after the reserve -> 7 messages (98) fit
        let kept = trim_to_budget(slice, 0, 5100, &tokenizer);
        assert_eq!(kept.len(), 7);
        assert_eq!(kept[0].text(), format!("{:040}", 1));
    }

    #[test]
    fn trim_halts_on_empty_even_over_budget() {
        let tokenizer = Tokenizer::approximate();
        let slice = vec![Message::user("abcdefgh")];
        // reserve alone exceeds the budget: everything goes, no panic
        let kept = trim_to_budget(slice, 0, 200, &tokenizer);
        assert!(kept.is_empty());
    }

    #[test]
    fn semantic_tokens_count_against_the_budget() {
        let tokenizer = Tokenizer::approximate();
        let slice = vec![Message::user("abcd"), Message::user("efgh")];
        // without semantic tokens both fit (5010 <= 5016)
        let kept = trim_to_budget(slice.clone(), 0, 5016, &tokenizer);
        assert_eq!(kept.len(), 2);
        // 10 semantic tokens push the first message out (5020 > 5016)
        let kept = trim_to_budget(slice, 10, 5016, &tokenizer);
        assert_eq!(kept.len(), 1);
    }
}

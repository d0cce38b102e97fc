//! Semantic-search node: query the code index with the last user message
//! and append the surviving chunks as a tagged context block.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use ragway_retrieval::types::{RetrievalContext, SemanticResult};
use ragway_retrieval::SemanticClient;
use tracing::{debug, warn};

use crate::msg::PromptMsg;
use crate::node::PromptNode;
use crate::recorder::Recorder;

const ENV_DETAILS_OPEN: &str = "<environment_details>";
const ENV_DETAILS_CLOSE: &str = "</environment_details>";
const SEARCH_DETAILS_OPEN: &str = "<codebase_search_details>";
const SEARCH_DETAILS_CLOSE: &str = "</codebase_search_details>";

pub struct SemanticSearchNode {
    client: Arc<SemanticClient>,
    top_k: u32,
    score_threshold: f64,
}

impl SemanticSearchNode {
    pub fn new(client: Arc<SemanticClient>, top_k: u32, score_threshold: f64) -> Self {
        Self {
            client,
            top_k,
            score_threshold,
        }
    }
}

#[async_trait]
impl PromptNode for SemanticSearchNode {
    fn name(&self) -> &'static str {
        "semantic_search"
    }

    async fn run(&self, msg: &mut PromptMsg, recorder: &mut Recorder) {
        let Some(last) = msg.last_user_msg.as_ref() else {
            return;
        };
        let query = strip_environment_details(&last.text());
        if query.trim().is_empty() {
            return;
        }

        let ctx = RetrievalContext {
            client_id: msg.identity.client_id.clone(),
            codebase_path: msg.identity.project_path.clone(),
            authorization: msg.identity.auth_token.clone(),
            client_version: msg.identity.client_version.clone(),
        };

        let started = Instant::now();
        let result = self
            .client
            .search(&ctx, &query, self.top_k, self.score_threshold)
            .await;
        recorder.semantic_latency_ms = started.elapsed().as_millis() as u64;

        let results = match result {
            Ok(r) => filter_by_score(r, self.score_threshold),
            Err(e) => {
                let e = ragway_core::RagwayError::Semantic(e.to_string());
                warn!(error = %e, "semantic search failed, passing through");
                recorder.semantic_error = Some(e.to_string());
                return;
            }
        };
        if results.is_empty() {
            debug!("semantic search returned nothing above threshold");
            return;
        }

        let block = format_results(&results);
        msg.semantic_context = block.clone();
        if let Some(last) = msg.last_user_msg.as_mut() {
            last.append_text_part(wrap_results(&block));
        }
        recorder.prompt_processed = true;
    }
}

/// Remove the first `<environment_details>…</environment_details>` span.
///
/// This is a raw substring search, first occurrence only; an opening tag
/// with no matching close leaves the text untouched. Matches the upstream
/// client's behaviour, which is not tag-aware.
pub(crate) fn strip_environment_details(text: &str) -> String {
    let Some(start) = text.find(ENV_DETAILS_OPEN) else {
        return text.to_string();
    };
    match text[start..].find(ENV_DETAILS_CLOSE) {
        Some(rel) => {
            let end = start + rel + ENV_DETAILS_CLOSE.len();
            format!("{}{}", &text[..start], &text[end..])
        }
        None => text.to_string(),
    }
}

/// Strict filter: only results below the threshold are dropped, so a score
/// exactly at the threshold survives.
pub(crate) fn filter_by_score(
    mut results: Vec<SemanticResult>,
    threshold: f64,
) -> Vec<SemanticResult> {
    results.retain(|r| !(r.score < threshold));
    results
}

/// The tagged part appended to the last user message.
pub(crate) fn wrap_results(block: &str) -> String {
    format!("{SEARCH_DETAILS_OPEN}\n{block}\n{SEARCH_DETAILS_CLOSE}")
}

/// Render surviving results into the context block appended to the user
/// message (without the wrapping tags).
pub(crate) fn format_results(results: &[SemanticResult]) -> String {
    let entries = results
        .iter()
        .map(|r| {
            format!(
                "File path: {}\nScore: {:.2}\nCode Chunk: \n{}",
                r.file_path, r.score, r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("[codebase_search] Result:\n{entries}")
}

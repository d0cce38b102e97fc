//! Processor selection: declared mode → chain.
//!
//! `raw` bypasses everything. All other modes get the RAG chain; when any
//! RAG dependency failed to construct at startup the selector degrades to
//! pass-through with a logged warning instead of failing requests.

use std::sync::Arc;

use ragway_core::config::{PromptConfig, SemanticConfig};
use ragway_core::tokenizer::Tokenizer;
use ragway_llm::LlmClient;
use ragway_retrieval::SemanticClient;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::background::BackgroundTasks;
use crate::cache::SystemPromptCache;
use crate::guideline::GuidelineCompressionNode;
use crate::node::{PromptChain, PromptNode};
use crate::semantic::SemanticSearchNode;
use crate::summary::UserHistoryNode;

/// Declared request mode. Unknown values fall back to `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Mode {
    Raw,
    Cost,
    Performance,
    Balanced,
    #[default]
    Auto,
}

impl From<String> for Mode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "raw" => Mode::Raw,
            "cost" => Mode::Cost,
            "performance" => Mode::Performance,
            "balanced" => Mode::Balanced,
            _ => Mode::Auto,
        }
    }
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Raw => "raw",
            Mode::Cost => "cost",
            Mode::Performance => "performance",
            Mode::Balanced => "balanced",
            Mode::Auto => "auto",
        }
    }
}

/// Long-lived chain dependencies, built once at startup.
pub struct ChainBuilder {
    semantic: Option<Arc<SemanticClient>>,
    summary_llm: Option<Arc<LlmClient>>,
    tokenizer: Arc<Tokenizer>,
    cache: Arc<SystemPromptCache>,
    background: Arc<BackgroundTasks>,
    prompt: PromptConfig,
    semantic_cfg: SemanticConfig,
    summary_api_key: Option<String>,
}

impl ChainBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        semantic: Option<Arc<SemanticClient>>,
        summary_llm: Option<Arc<LlmClient>>,
        tokenizer: Arc<Tokenizer>,
        cache: Arc<SystemPromptCache>,
        background: Arc<BackgroundTasks>,
        prompt: PromptConfig,
        semantic_cfg: SemanticConfig,
        summary_api_key: Option<String>,
    ) -> Self {
        Self {
            semantic,
            summary_llm,
            tokenizer,
            cache,
            background,
            prompt,
            semantic_cfg,
            summary_api_key,
        }
    }

    pub fn recent_user_msgs_used(&self) -> usize {
        self.prompt.recent_user_msgs_used
    }

    /// Build the chain for one request.
    pub fn select(&self, mode: Mode) -> PromptChain {
        if mode == Mode::Raw {
            return PromptChain::passthrough();
        }

        let (Some(semantic), Some(summary_llm)) = (&self.semantic, &self.summary_llm) else {
            warn!(
                mode = mode.as_str(),
                "RAG dependencies unavailable, degrading to pass-through"
            );
            return PromptChain::passthrough();
        };

        let nodes: Vec<Box<dyn PromptNode>> = vec![
            Box::new(GuidelineCompressionNode::new(
                self.cache.clone(),
                summary_llm.clone(),
                self.background.clone(),
                self.prompt.system_prompt_splitter.clone(),
                self.summary_api_key.clone(),
            )),
            Box::new(SemanticSearchNode::new(
                semantic.clone(),
                self.semantic_cfg.top_k,
                self.semantic_cfg.score_threshold,
            )),
            Box::new(UserHistoryNode::new(
                summary_llm.clone(),
                self.tokenizer.clone(),
                self.prompt.token_threshold,
                self.prompt.summary_model_token_threshold,
                self.summary_api_key.clone(),
            )),
        ];
        PromptChain::new(nodes)
    }
}

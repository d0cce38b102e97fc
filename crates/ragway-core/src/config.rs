use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{RagwayError, Result};

pub const DEFAULT_PORT: u16 = 8899;
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Top-level config (ragway.yaml + RAGWAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RagwayConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub summary_llm: SummaryLlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Main chat model endpoint. The client's `Authorization` header is forwarded
/// verbatim, so no API key lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Timeout for non-streaming calls, seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            chat_path: default_chat_path(),
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Cheap model used for guideline compression, user-history summaries and
/// background log classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryLlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_summary_model")]
    pub model: String,
    /// API key for calls that run outside a request (classification).
    /// In-request summary calls fall back to the forwarded client token.
    pub api_key: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummaryLlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            chat_path: default_chat_path(),
            model: default_summary_model(),
            api_key: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub definition: EndpointConfig,
    #[serde(default)]
    pub reference: EndpointConfig,
    #[serde(default)]
    pub knowledge: EndpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    #[serde(default)]
    pub search_endpoint: String,
    #[serde(default)]
    pub ready_endpoint: String,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Results strictly below this score are dropped.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            search_endpoint: String::new(),
            ready_endpoint: String::new(),
            timeout_secs: default_retrieval_timeout_secs(),
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub search_endpoint: String,
    #[serde(default)]
    pub ready_endpoint: String,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            search_endpoint: String::new(),
            ready_endpoint: String::new(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// How many of the most recent user messages stay verbatim when the
    /// older history is summarised.
    #[serde(default = "default_recent_user_msgs")]
    pub recent_user_msgs_used: usize,
    /// User-history compression kicks in above this many tokens.
    #[serde(default = "default_token_threshold")]
    pub token_threshold: usize,
    /// Context window budget of the summary model.
    #[serde(default = "default_summary_model_token_threshold")]
    pub summary_model_token_threshold: usize,
    /// Literal marker dividing the system prompt into a per-request prefix
    /// and the cacheable guidelines tail.
    #[serde(default = "default_splitter")]
    pub system_prompt_splitter: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            recent_user_msgs_used: default_recent_user_msgs(),
            token_threshold: default_token_threshold(),
            summary_model_token_threshold: default_summary_model_token_threshold(),
            system_prompt_splitter: default_splitter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Maximum silence within one streaming attempt, milliseconds.
    #[serde(default = "default_per_idle_ms")]
    pub per_idle_ms: u64,
    /// Cumulative idle ceiling across all resets and attempts, milliseconds.
    #[serde(default = "default_total_idle_ms")]
    pub total_idle_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            per_idle_ms: default_per_idle_ms(),
            total_idle_ms: default_total_idle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Root directory for temp and permanent chat-log files.
    #[serde(default = "default_log_file_path")]
    pub file_path: String,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Loki-style push endpoint. Shipping is skipped when unset.
    pub sink_endpoint: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: default_log_file_path(),
            scan_interval_secs: default_scan_interval_secs(),
            queue_size: default_queue_size(),
            sink_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Per-request summary receiver. Reporting is skipped when unset.
    pub report_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenizerConfig {
    /// Use the `len/4` estimate instead of the BPE table.
    #[serde(default)]
    pub approximate: bool,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_llm_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_chat_path() -> String {
    "/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "deepseek-v3".to_string()
}
fn default_summary_model() -> String {
    "qwen2.5-7b-instruct".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_retrieval_timeout_secs() -> u64 {
    5
}
fn default_top_k() -> u32 {
    5
}
fn default_score_threshold() -> f64 {
    0.5
}
fn default_recent_user_msgs() -> usize {
    1
}
fn default_token_threshold() -> usize {
    20_000
}
fn default_summary_model_token_threshold() -> usize {
    28_000
}
fn default_splitter() -> String {
    "====\n\nTOOL GUIDELINES".to_string()
}
fn default_per_idle_ms() -> u64 {
    30_000
}
fn default_total_idle_ms() -> u64 {
    300_000
}
fn default_log_file_path() -> String {
    "./chat-logs".to_string()
}
fn default_scan_interval_secs() -> u64 {
    60
}
fn default_queue_size() -> usize {
    1000
}

impl RagwayConfig {
    /// Load config from a YAML file with RAGWAY_* env var overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or("ragway.yaml");

        let config: RagwayConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("RAGWAY_").split("_"))
            .extract()
            .map_err(|e| RagwayError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would violate runtime invariants.
    pub fn validate(&self) -> Result<()> {
        if self.stream.per_idle_ms == 0 || self.stream.total_idle_ms == 0 {
            return Err(RagwayError::Config(
                "stream budgets must be positive".to_string(),
            ));
        }
        if self.stream.per_idle_ms > self.stream.total_idle_ms {
            return Err(RagwayError::Config(format!(
                "per_idle_ms ({}) must not exceed total_idle_ms ({})",
                self.stream.per_idle_ms, self.stream.total_idle_ms
            )));
        }
        if self.log.queue_size == 0 {
            return Err(RagwayError::Config(
                "log queue_size must be positive".to_string(),
            ));
        }
        if self.prompt.system_prompt_splitter.is_empty() {
            return Err(RagwayError::Config(
                "system_prompt_splitter must not be empty".to_string(),
            ));
        }
        if self.prompt.recent_user_msgs_used == 0 {
            return Err(RagwayError::Config(
                "recent_user_msgs_used must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

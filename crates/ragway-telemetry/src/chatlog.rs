//! The per-request record. Created at request entry, mutated by the
//! pipeline until the response ends, serialized once into the spool, and
//! destroyed after a successful ship and promote.

use chrono::{DateTime, Utc};
use ragway_core::identity::Identity;
use ragway_core::message::Message;
use serde::{Deserialize, Serialize};

use crate::chunkstats::ChunkSummary;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStats {
    pub system_tokens: i64,
    pub user_tokens: i64,
    /// Counts every message; always ≥ system + user.
    pub all: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tokens {
    pub original: TokenStats,
    pub processed: TokenStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Latency {
    pub first_token_ms: u64,
    pub main_model_ms: u64,
    pub semantic_ms: u64,
    pub summary_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// The inbound request as the upstream saw it: messages plus any
/// pass-through fields. The sweep rebuilds classification calls from the
/// messages kept here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestParams {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLog {
    pub identity: Identity,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub params: RequestParams,
    #[serde(default)]
    pub tokens: Tokens,
    #[serde(default)]
    pub latency: Latency,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub is_prompt_proceed: bool,
    #[serde(default)]
    pub is_user_prompt_compressed: bool,
    #[serde(default)]
    pub compressed_prompt: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub chunks: Option<ChunkSummary>,
}

impl ChatLog {
    pub fn new(identity: Identity, model: impl Into<String>, params: RequestParams) -> Self {
        Self {
            identity,
            timestamp: Utc::now(),
            model: model.into(),
            params,
            tokens: Tokens::default(),
            latency: Latency::default(),
            usage: TokenUsage::default(),
            is_prompt_proceed: false,
            is_user_prompt_compressed: false,
            compressed_prompt: String::new(),
            category: None,
            errors: Vec::new(),
            chunks: None,
        }
    }

    /// User-role messages of the original request, for classification.
    pub fn user_messages(&self) -> Vec<Message> {
        self.params
            .messages
            .iter()
            .filter(|m| m.is_user())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_and_parses_back() {
        let mut log = ChatLog::new(
            Identity::default(),
            "deepseek-v3",
            RequestParams {
                messages: vec![Message::user("hi")],
                stream: true,
                mode: "balanced".into(),
                extra: Default::default(),
            },
        );
        log.tokens.original.all = 42;
        log.errors.push("semantic: boom".into());

        let json = serde_json::to_string(&log).unwrap();
        let parsed: ChatLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.model, "deepseek-v3");
        assert_eq!(parsed.tokens.original.all, 42);
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.category.is_none());
    }

    #[test]
    fn user_messages_filters_roles() {
        let log = ChatLog::new(
            Identity::default(),
            "m",
            RequestParams {
                messages: vec![
                    Message::system("s"),
                    Message::user("q1"),
                    Message::assistant("a"),
                    Message::user("q2"),
                ],
                ..Default::default()
            },
        );
        let users = log.user_messages();
        assert_eq!(users.len(), 2);
    }
}

//! Process-wide content-addressed cache of compressed guideline sections.
//!
//! Keys are the SHA-256 of the uncompressed tail; entries are never evicted
//! for the life of the process. Reads dominate and do not block each other.

use dashmap::DashMap;
use sha2::{Digest, Sha256};

pub struct SystemPromptCache {
    entries: DashMap<String, String>,
}

impl SystemPromptCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SystemPromptCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase hex SHA-256 of `content`, used as the cache key.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

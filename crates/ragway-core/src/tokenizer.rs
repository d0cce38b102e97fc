//! Token counting over a real BPE table.
//!
//! Construction fails hard when the table cannot be loaded; the `len/4`
//! estimate is available only by explicit opt-in (`tokenizer.approximate`
//! in config). All methods are deterministic and the type is `Send + Sync`.

use tiktoken_rs::CoreBPE;

use crate::config::TokenizerConfig;
use crate::error::{RagwayError, Result};
use crate::message::Message;

/// Fixed framing overhead added per message (role + separators).
const MESSAGE_FRAMING_TOKENS: usize = 4;

pub struct Tokenizer {
    inner: Inner,
}

enum Inner {
    Bpe(CoreBPE),
    Approximate,
}

impl Tokenizer {
    /// Load the o200k BPE table. Hard error when the table is unavailable.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::o200k_base()
            .map_err(|e| RagwayError::Config(format!("BPE table load failed: {e}")))?;
        Ok(Self {
            inner: Inner::Bpe(bpe),
        })
    }

    /// The `len/4` estimator, for deployments that opt out of the table.
    pub fn approximate() -> Self {
        Self {
            inner: Inner::Approximate,
        }
    }

    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        if config.approximate {
            Ok(Self::approximate())
        } else {
            Self::new()
        }
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        match &self.inner {
            Inner::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Inner::Approximate => text.len() / 4,
        }
    }

    /// Sum of per-message counts plus a fixed framing overhead per message.
    pub fn count_messages_tokens(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| self.count_tokens(&m.text()) + MESSAGE_FRAMING_TOKENS)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approximate_counts_quarter_length() {
        let t = Tokenizer::approximate();
        assert_eq!(t.count_tokens(""), 0);
        assert_eq!(t.count_tokens("abcdefgh"), 2);
    }

    #[test]
    fn messages_include_framing_overhead() {
        let t = Tokenizer::approximate();
        let msgs = vec![Message::user("abcdefgh"), Message::assistant("abcd")];
        // 2 + 4 framing, 1 + 4 framing
        assert_eq!(t.count_messages_tokens(&msgs), 11);
    }

    #[test]
    fn bpe_counting_is_deterministic() {
        let t = Tokenizer::new().expect("bundled table loads");
        let a = t.count_tokens("fn main() { println!(\"hello\"); }");
        let b = t.count_tokens("fn main() { println!(\"hello\"); }");
        assert_eq!(a, b);
        assert!(a > 0);
    }

    #[test]
    fn empty_message_list_counts_zero() {
        let t = Tokenizer::approximate();
        assert_eq!(t.count_messages_tokens(&[]), 0);
    }
}

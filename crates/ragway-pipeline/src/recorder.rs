/// Per-invocation side channel: latencies and errors the chain produces,
/// later merged into the request's chat log.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub semantic_latency_ms: u64,
    pub semantic_error: Option<String>,
    pub summary_latency_ms: u64,
    pub summary_error: Option<String>,
    /// True once any node rewrote part of the prompt.
    pub prompt_processed: bool,
    /// True when the older user history was replaced by a summary.
    pub user_prompt_compressed: bool,
    /// The summary text that replaced the older history.
    pub compressed_prompt: String,
}

impl Recorder {
    /// Error strings for the chat log, in taxonomy order.
    pub fn errors(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(e) = &self.semantic_error {
            out.push(format!("semantic: {e}"));
        }
        if let Some(e) = &self.summary_error {
            out.push(format!("summary: {e}"));
        }
        out
    }
}

//! OpenAI-compatible chat client: non-stream, stream-with-callback, and a
//! convenience generation call for the summary/classification models.

pub mod client;
pub mod lines;
pub mod types;

pub use client::LlmClient;
pub use lines::LineAssembler;
pub use types::{CompletionResponse, StreamChunk, Usage};

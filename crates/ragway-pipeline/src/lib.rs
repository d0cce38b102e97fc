//! Prompt-processing pipeline.
//!
//! A request's messages are split into a [`msg::PromptMsg`] working set,
//! pushed through an ordered chain of processors (guideline compression →
//! semantic search → user-history compression) and reassembled for the
//! upstream LLM. Processors record latency and errors into a
//! [`recorder::Recorder`] and never abort the request.

pub mod background;
pub mod cache;
pub mod guideline;
pub mod msg;
pub mod node;
pub mod recorder;
pub mod selector;
pub mod semantic;
pub mod summary;

pub use background::BackgroundTasks;
pub use cache::SystemPromptCache;
pub use msg::PromptMsg;
pub use node::{PromptChain, PromptNode};
pub use recorder::Recorder;
pub use selector::{ChainBuilder, Mode};

//! Typed HTTP clients for the code-indexing services.
//!
//! One client per retrieval kind (semantic, definition, reference,
//! knowledge), each with its own search and readiness endpoints and a
//! per-call timeout. No retries live here; callers decide.

pub mod definition;
pub mod knowledge;
pub mod reference;
pub mod semantic;
pub mod types;

mod http;

pub use definition::DefinitionClient;
pub use knowledge::KnowledgeClient;
pub use reference::ReferenceClient;
pub use semantic::SemanticClient;

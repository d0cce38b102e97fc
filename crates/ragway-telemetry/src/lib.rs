//! Observability pipeline: per-request chat logs spooled to disk, a
//! periodic sweep that classifies, ships and archives them, Prometheus
//! metrics, and an optional per-request summary reporter.

pub mod chatlog;
pub mod chunkstats;
pub mod files;
pub mod metrics;
pub mod processor;
pub mod reporter;
pub mod sink;
pub mod spool;

pub use chatlog::ChatLog;
pub use chunkstats::{ChunkStats, ChunkSummary};
pub use processor::LogProcessor;
pub use reporter::MetricsReporter;
pub use sink::LogSinkClient;
pub use spool::ChatLogSpool;

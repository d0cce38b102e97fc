//! Streaming forwarder: LLM SSE lines → client body, with the idle timer
//! reset on every line and chunk gaps sampled along the way.
//!
//! Lines travel byte-exact (the `data: ` prefix included) followed by the
//! blank SSE event separator. On a terminal error after streaming began,
//! a final `data: {"error":…}` event is written before the body closes.

use std::convert::Infallible;
use std::time::Instant;

use bytes::Bytes;
use futures_util::StreamExt;
use ragway_core::RagwayError;
use ragway_llm::{LineAssembler, StreamChunk, Usage};
use ragway_telemetry::{ChunkStats, ChunkSummary};
use tokio::sync::mpsc;
use tracing::debug;

use crate::idle::{IdleReason, IdleTimer};

pub struct StreamOutcome {
    pub usage: Option<Usage>,
    pub first_token_ms: u64,
    pub main_model_ms: u64,
    pub chunks_forwarded: u64,
    pub reset_count: u64,
    pub summary: ChunkSummary,
    pub error: Option<RagwayError>,
}

/// Drive one open LLM stream to completion, cancellation, or failure.
/// `dispatched` is the instant the upstream request was sent, so first-token
/// latency covers the whole round trip.
pub async fn forward_stream(
    resp: reqwest::Response,
    timer: &IdleTimer,
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    dispatched: Instant,
) -> StreamOutcome {
    let token = timer.token();
    let mut assembler = LineAssembler::new();
    let mut stats = ChunkStats::new();
    let mut byte_stream = resp.bytes_stream();

    let mut usage: Option<Usage> = None;
    let mut first_token_ms: u64 = 0;
    let mut forwarded: u64 = 0;
    let mut error: Option<RagwayError> = None;

    'outer: loop {
        tokio::select! {
            _ = token.cancelled() => {
                error = Some(timeout_error(timer));
                break;
            }
            maybe = byte_stream.next() => match maybe {
                Some(Ok(chunk)) => {
                    for line in assembler.push(&chunk) {
                        if line.is_empty() {
                            continue;
                        }
                        timer.reset();
                        stats.observe();
                        if first_token_ms == 0 {
                            first_token_ms = (dispatched.elapsed().as_millis() as u64).max(1);
                        }
                        // Pick up usage from the final include_usage chunk;
                        // decode failures never interrupt forwarding.
                        if let Some(data) = line.strip_prefix("data: ") {
                            if let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) {
                                if let Some(u) = parsed.usage {
                                    usage = Some(u);
                                }
                            }
                        }
                        forwarded += 1;
                        let frame = Bytes::from(format!("{line}\n\n"));
                        // The send races the idle context: a stalled client
                        // must not pin the forwarder past its budgets.
                        tokio::select! {
                            sent = tx.send(Ok(frame)) => {
                                if sent.is_err() {
                                    debug!("client response writer gone");
                                    error = Some(RagwayError::Cancelled);
                                    break 'outer;
                                }
                            }
                            _ = token.cancelled() => {
                                error = Some(timeout_error(timer));
                                break 'outer;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    error = Some(RagwayError::transport(e));
                    break;
                }
                None => break,
            }
        }
    }

    timer.stop();
    match &error {
        None => stats.end(),
        Some(e) => {
            stats.stop(e.error_type());
            let event = serde_json::json!({
                "error": { "message": e.to_string(), "type": e.error_type() }
            });
            let _ = tx.try_send(Ok(Bytes::from(format!("data: {event}\n\n"))));
        }
    }

    StreamOutcome {
        usage,
        first_token_ms,
        main_model_ms: dispatched.elapsed().as_millis() as u64,
        chunks_forwarded: forwarded,
        reset_count: timer.reset_count(),
        summary: stats.summary(),
        error,
    }
}

fn timeout_error(timer: &IdleTimer) -> RagwayError {
    match timer.reason() {
        Some(IdleReason::PerIdle) => RagwayError::PerIdleTimeout,
        Some(IdleReason::Total) => RagwayError::TotalTimeout,
        _ => RagwayError::Cancelled,
    }
}

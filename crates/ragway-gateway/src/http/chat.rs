//! POST /v1/chat/completions, the gateway's single chat endpoint.
//!
//! Builds the request identity, runs the selected prompt chain, forwards to
//! the upstream model (streaming or not), and hands the finished chat log
//! to the spool. Unknown request fields pass through to the upstream
//! untouched.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use ragway_core::identity::Identity;
use ragway_core::message::{Message, Role};
use ragway_core::tokenizer::Tokenizer;
use ragway_core::RagwayError;
use ragway_llm::CompletionResponse;
use ragway_pipeline::{Mode, PromptMsg, Recorder};
use ragway_telemetry::chatlog::{RequestParams, TokenStats, TokenUsage};
use ragway_telemetry::{metrics, ChatLog};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::forward::forward_stream;
use crate::idle::{IdleTimer, IdleTracker};

/// Longest upstream error body echoed back to the client.
const ERROR_BODY_CAP: usize = 2048;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub mode: Mode,
    /// Everything else passes through to the upstream verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChatCompletionRequest>,
) -> Response {
    let started = Instant::now();
    let identity = Arc::new(Identity::from_headers(&headers));
    let model = req
        .model
        .clone()
        .unwrap_or_else(|| state.llm.model().to_string());

    info!(
        request_id = %identity.request_id,
        mode = req.mode.as_str(),
        stream = req.stream,
        messages = req.messages.len(),
        "chat request"
    );

    let mut log = ChatLog::new(
        (*identity).clone(),
        &model,
        RequestParams {
            messages: req.messages.clone(),
            stream: req.stream,
            mode: req.mode.as_str().to_string(),
            extra: req.extra.clone(),
        },
    );
    log.tokens.original = token_stats(&state.tokenizer, &req.messages);

    // ── Prompt chain ─────────────────────────────────────────────────────
    let chain = state.chains.select(req.mode);
    let mut recorder = Recorder::default();
    let processed = if chain.is_passthrough() {
        req.messages
    } else {
        let mut prompt = PromptMsg::split(
            req.messages,
            state.chains.recent_user_msgs_used(),
            identity.clone(),
        );
        chain.execute(&mut prompt, &mut recorder).await;
        prompt.reassemble()
    };

    log.tokens.processed = token_stats(&state.tokenizer, &processed);
    log.latency.semantic_ms = recorder.semantic_latency_ms;
    log.latency.summary_ms = recorder.summary_latency_ms;
    log.is_prompt_proceed = recorder.prompt_processed;
    log.is_user_prompt_compressed = recorder.user_prompt_compressed;
    log.compressed_prompt = recorder.compressed_prompt.clone();
    log.errors.extend(recorder.errors());
    if recorder.semantic_error.is_some() {
        metrics::record_error(&identity, &model, "semantic");
    }
    if recorder.summary_error.is_some() {
        metrics::record_error(&identity, &model, "summary");
    }

    // ── Outbound payload: pass-through fields + processed messages ───────
    let mut payload = req.extra;
    payload.insert("model".to_string(), json!(model));
    match serde_json::to_value(&processed) {
        Ok(messages) => {
            payload.insert("messages".to_string(), messages);
        }
        Err(e) => {
            warn!(error = %e, "processed messages unserializable");
            return error_response(&RagwayError::decode(e));
        }
    }
    payload.insert("stream".to_string(), json!(req.stream));
    let payload = Value::Object(payload);

    if req.stream {
        stream_response(state, identity, log, payload, started).await
    } else {
        unary_response(state, identity, log, payload, started).await
    }
}

async fn unary_response(
    state: Arc<AppState>,
    identity: Arc<Identity>,
    mut log: ChatLog,
    payload: Value,
    started: Instant,
) -> Response {
    let call_started = Instant::now();
    let result = state.llm.forward_raw(&identity.auth_token, &payload).await;
    let call_ms = call_started.elapsed().as_millis() as u64;

    match result {
        Ok(raw) => {
            log.latency.first_token_ms = call_ms;
            log.latency.main_model_ms = call_ms;
            log.latency.total_ms = started.elapsed().as_millis() as u64;
            if let Ok(parsed) = serde_json::from_str::<CompletionResponse>(&raw) {
                if let Some(usage) = parsed.usage {
                    log.usage = TokenUsage {
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                    };
                }
            }
            finalize(&state, log).await;

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(raw))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            warn!(error = %e, "upstream chat call failed");
            metrics::record_error(&identity, &log.model, e.error_type());
            log.errors.push(e.to_string());
            log.latency.total_ms = started.elapsed().as_millis() as u64;
            finalize(&state, log).await;
            error_response(&e)
        }
    }
}

async fn stream_response(
    state: Arc<AppState>,
    identity: Arc<Identity>,
    mut log: ChatLog,
    payload: Value,
    started: Instant,
) -> Response {
    let dispatched = Instant::now();
    let resp = match state.llm.open_stream(&identity.auth_token, &payload).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(error = %e, "upstream stream open failed");
            metrics::record_error(&identity, &log.model, e.error_type());
            log.errors.push(e.to_string());
            log.latency.total_ms = started.elapsed().as_millis() as u64;
            finalize(&state, log).await;
            return error_response(&e);
        }
    };

    // Armed before the first byte is forwarded.
    let request_token = CancellationToken::new();
    let tracker = IdleTracker::new(Duration::from_millis(state.config.stream.total_idle_ms));
    let timer = IdleTimer::new(
        &request_token,
        Duration::from_millis(state.config.stream.per_idle_ms),
        tracker,
    );

    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(64);
    tokio::spawn(async move {
        let outcome = forward_stream(resp, &timer, tx, dispatched).await;

        log.latency.first_token_ms = outcome.first_token_ms;
        log.latency.main_model_ms = outcome.main_model_ms;
        log.latency.total_ms = started.elapsed().as_millis() as u64;
        if let Some(usage) = outcome.usage {
            log.usage = TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            };
        }
        log.chunks = Some(outcome.summary);
        if let Some(e) = &outcome.error {
            metrics::record_error(&identity, &log.model, e.error_type());
            log.errors.push(e.to_string());
        }
        debug!(
            request_id = %identity.request_id,
            chunks = outcome.chunks_forwarded,
            resets = outcome.reset_count,
            error = outcome.error.is_some(),
            "stream finished"
        );
        finalize(&state, log).await;
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Spool the finished record and fire the optional reporter. Neither can
/// fail the request.
async fn finalize(state: &Arc<AppState>, log: ChatLog) {
    if let Some(reporter) = state.reporter.clone() {
        let record = log.clone();
        state.background.spawn("metrics_report", async move {
            if let Err(e) = reporter.report(&record).await {
                warn!(error = %e, "metrics report failed");
            }
        });
    }
    state.spool.log_async(Box::new(log)).await;
}

/// Scoped token counts for one message list.
fn token_stats(tokenizer: &Tokenizer, messages: &[Message]) -> TokenStats {
    let mut stats = TokenStats::default();
    for message in messages {
        let tokens = tokenizer.count_messages_tokens(std::slice::from_ref(message)) as i64;
        stats.all += tokens;
        match message.role {
            Role::System => stats.system_tokens += tokens,
            Role::User => stats.user_tokens += tokens,
            _ => {}
        }
    }
    stats
}

/// Terminal failure before any byte reached the client: 5xx with the
/// upstream's status and truncated body captured.
fn error_response(error: &RagwayError) -> Response {
    let status = match error {
        RagwayError::Remote { .. } | RagwayError::Transport(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = match error {
        RagwayError::Remote {
            status: upstream,
            body,
            url,
        } => json!({
            "error": {
                "message": format!("upstream returned {upstream}"),
                "type": error.error_type(),
                "upstream_status": upstream,
                "upstream_body": truncate(body, ERROR_BODY_CAP),
                "url": url,
            }
        }),
        _ => json!({
            "error": { "message": error.to_string(), "type": error.error_type() }
        }),
    };
    (status, Json(body)).into_response()
}

fn truncate(text: &str, cap: usize) -> &str {
    if text.len() <= cap {
        return text;
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragway_core::message::MessageContent;

    #[test]
    fn token_stats_scopes_are_disjoint_subsets() {
        let tokenizer = Tokenizer::approximate();
        let messages = vec![
            Message::system("abcdefgh"),
            Message::user("abcd"),
            Message::assistant("abcdefgh"),
            Message::user("abcd"),
        ];
        let stats = token_stats(&tokenizer, &messages);
        assert_eq!(stats.system_tokens, 6); // 2 + framing 4
        assert_eq!(stats.user_tokens, 10); // 2 * (1 + 4)
        assert_eq!(stats.all, 22);
        assert!(stats.all >= stats.system_tokens + stats.user_tokens);
    }

    #[test]
    fn request_parses_with_passthrough_fields() {
        let json = r#"{
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true,
            "mode": "balanced",
            "temperature": 0.2,
            "top_p": 0.9
        }"#;
        let req: ChatCompletionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.mode, Mode::Balanced);
        assert!(req.stream);
        assert_eq!(req.extra.get("temperature"), Some(&json!(0.2)));
        assert_eq!(req.extra.get("top_p"), Some(&json!(0.9)));
    }

    #[test]
    fn request_defaults_mode_to_auto() {
        let json = r#"{"messages": [{"role": "user", "content": "hi"}]}"#;
        let req: ChatCompletionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.mode, Mode::Auto);
        assert!(!req.stream);
        assert!(matches!(
            req.messages[0].content,
            MessageContent::Text(_)
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "ααααα"; // 10 bytes
        assert_eq!(truncate(text, 3), "α");
        assert_eq!(truncate(text, 10), text);
    }

    #[test]
    fn error_response_statuses() {
        let remote = RagwayError::Remote {
            status: 503,
            body: "x".repeat(5000),
            url: "http://llm/v1/chat/completions".into(),
        };
        let resp = error_response(&remote);
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = error_response(&RagwayError::TotalTimeout);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! Prometheus metrics for the gateway.
//!
//! A global recorder is installed once at startup; the axum handler renders
//! the handle. Counter and histogram names are stable interfaces: dashboards
//! depend on them.

use std::sync::OnceLock;

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use ragway_core::identity::Identity;
use ragway_core::prompts::CATEGORY_UNKNOWN;
use ragway_core::{RagwayError, Result};
use tracing::{info, warn};

use crate::chatlog::ChatLog;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

type Labels = Vec<(&'static str, String)>;

const LATENCY_MS_BUCKETS: &[f64] = &[
    5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10_000.0, 30_000.0,
    60_000.0,
];
const COMPRESSION_RATIO_BUCKETS: &[f64] =
    &[0.1, 0.25, 0.5, 0.75, 0.9, 1.0, 1.1, 1.25, 1.5, 2.0];

/// Install the Prometheus recorder with the histogram bucket layout.
pub fn init_metrics() -> Result<()> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("compression_ratio".to_string()),
            COMPRESSION_RATIO_BUCKETS,
        )
        .map_err(|e| RagwayError::Config(e.to_string()))?
        .set_buckets_for_metric(Matcher::Suffix("_latency_ms".to_string()), LATENCY_MS_BUCKETS)
        .map_err(|e| RagwayError::Config(e.to_string()))?;

    let handle = builder
        .install_recorder()
        .map_err(|e| RagwayError::Config(format!("failed to install Prometheus recorder: {e}")))?;
    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| RagwayError::Config("Prometheus handle already initialized".to_string()))?;

    info!("Prometheus metrics initialized");
    Ok(())
}

/// GET /metrics, Prometheus exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Base label set shared by every series.
fn base_labels(identity: &Identity, model: &str) -> Labels {
    let (d1, d2, d3, d4) = match &identity.user_info {
        Some(info) => (
            info.dept_level1.clone(),
            info.dept_level2.clone(),
            info.dept_level3.clone(),
            info.dept_level4.clone(),
        ),
        None => Default::default(),
    };
    vec![
        ("client_id", identity.client_id.clone()),
        ("client_ide", identity.client_ide.clone()),
        ("model", model.to_string()),
        ("user", identity.user_name.clone()),
        ("login_from", identity.login_from.clone()),
        ("caller", identity.caller.clone()),
        ("sender", identity.sender.clone()),
        ("dept_level1", d1),
        ("dept_level2", d2),
        ("dept_level3", d3),
        ("dept_level4", d4),
    ]
}

/// Record every series derived from one finished chat log.
pub fn record_chat_log(record: &ChatLog) {
    let base = base_labels(&record.identity, &record.model);

    let category = record
        .category
        .clone()
        .unwrap_or_else(|| CATEGORY_UNKNOWN.to_string());
    let mut request_labels = base.clone();
    request_labels.push(("category", category));
    counter!("requests_total", &request_labels).increment(1);

    record_token_scope(
        "original_tokens_total",
        &base,
        &[
            ("system", record.tokens.original.system_tokens),
            ("user", record.tokens.original.user_tokens),
            ("all", record.tokens.original.all),
        ],
    );
    record_token_scope(
        "compressed_tokens_total",
        &base,
        &[
            ("system", record.tokens.processed.system_tokens),
            ("user", record.tokens.processed.user_tokens),
            ("all", record.tokens.processed.all),
        ],
    );

    if record.usage.completion_tokens > 0 {
        counter!("response_tokens_total", &base).increment(record.usage.completion_tokens);
    }
    if record.is_user_prompt_compressed {
        counter!("user_prompt_compressed_total", &base).increment(1);
    }

    if record.tokens.original.all > 0 && record.tokens.processed.all > 0 {
        let ratio = record.tokens.processed.all as f64 / record.tokens.original.all as f64;
        histogram!("compression_ratio", &base).record(ratio);
    }

    if record.latency.semantic_ms > 0 {
        histogram!("semantic_latency_ms", &base).record(record.latency.semantic_ms as f64);
    }
    if record.latency.summary_ms > 0 {
        histogram!("summary_latency_ms", &base).record(record.latency.summary_ms as f64);
    }
    if record.latency.main_model_ms > 0 {
        histogram!("main_model_latency_ms", &base).record(record.latency.main_model_ms as f64);
    }
    if record.latency.total_ms > 0 {
        histogram!("total_latency_ms", &base).record(record.latency.total_ms as f64);
    }
}

/// Count an error against the request's base labels.
pub fn record_error(identity: &Identity, model: &str, error_type: &str) {
    let mut labels = base_labels(identity, model);
    labels.push(("error_type", error_type.to_string()));
    counter!("errors_total", &labels).increment(1);
}

/// Negative token counts are logged and skipped; zeroes skipped silently.
fn record_token_scope(name: &'static str, base: &Labels, scopes: &[(&'static str, i64)]) {
    for (scope, value) in scopes {
        if *value < 0 {
            warn!(metric = name, scope, value, "negative token count skipped");
            continue;
        }
        if *value == 0 {
            continue;
        }
        let mut labels = base.clone();
        labels.push(("token_scope", scope.to_string()));
        counter!(name, &labels).increment(*value as u64);
    }
}

//! Optional per-request summary push to an HTTP receiver.
//!
//! Fired after the response completes; failures are logged and never affect
//! the request outcome.

use std::time::Duration;

use ragway_core::{RagwayError, Result};
use serde_json::json;
use tracing::debug;

use crate::chatlog::ChatLog;

const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MetricsReporter {
    client: reqwest::Client,
    report_url: String,
}

impl MetricsReporter {
    pub fn new(report_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REPORT_TIMEOUT)
            .build()
            .map_err(RagwayError::transport)?;
        Ok(Self {
            client,
            report_url: report_url.into(),
        })
    }

    pub async fn report(&self, record: &ChatLog) -> Result<()> {
        let payload = build_payload(record);
        let resp = self
            .client
            .post(&self.report_url)
            .header("Authorization", record.identity.auth_token.as_str())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(RagwayError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RagwayError::Remote {
                status: status.as_u16(),
                body,
                url: self.report_url.clone(),
            });
        }
        debug!(request_id = %record.identity.request_id, "request metrics reported");
        Ok(())
    }
}

fn build_payload(record: &ChatLog) -> serde_json::Value {
    let info = record.identity.user_info.clone().unwrap_or_default();
    json!({
        "request_id": record.identity.request_id,
        "request_metrics": {
            "original_tokens": record.tokens.original,
            "processed_tokens": record.tokens.processed,
            "is_prompt_proceed": record.is_prompt_proceed,
            "is_user_prompt_compressed": record.is_user_prompt_compressed,
            "mode": record.params.mode,
        },
        "response_metrics": {
            "prompt_tokens": record.usage.prompt_tokens,
            "completion_tokens": record.usage.completion_tokens,
            "first_token_ms": record.latency.first_token_ms,
            "main_model_ms": record.latency.main_model_ms,
            "semantic_ms": record.latency.semantic_ms,
            "summary_ms": record.latency.summary_ms,
            "total_ms": record.latency.total_ms,
            "errors": record.errors,
        },
        "label": {
            "client_id": record.identity.client_id,
            "client_ide": record.identity.client_ide,
            "model": record.model,
            "user": record.identity.user_name,
            "login_from": record.identity.login_from,
            "caller": record.identity.caller,
            "sender": record.identity.sender,
            "dept_level1": info.dept_level1,
            "dept_level2": info.dept_level2,
            "dept_level3": info.dept_level3,
            "dept_level4": info.dept_level4,
        },
    })
}

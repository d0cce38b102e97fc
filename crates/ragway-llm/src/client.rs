use std::time::Duration;

use futures_util::StreamExt;
use ragway_core::config::{LlmConfig, SummaryLlmConfig};
use ragway_core::message::Message;
use ragway_core::{RagwayError, Result};
use serde_json::{json, Value};
use tracing::debug;

use crate::lines::LineAssembler;
use crate::types::CompletionResponse;

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    chat_path: String,
    model: String,
    /// Applies to non-streaming calls and to the header phase of streaming
    /// calls. The streamed body itself is guarded by the idle controller,
    /// not by a wall-clock cap.
    timeout: Duration,
}

impl LlmClient {
    /// `base_url` without a trailing slash, `chat_path` starting with "/".
    pub fn new(
        base_url: impl Into<String>,
        chat_path: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(RagwayError::transport)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            chat_path: chat_path.into(),
            model: model.into(),
            timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.chat_path,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn from_summary_config(config: &SummaryLlmConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.chat_path,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Active model name, for the chat log.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }

    /// POST an arbitrary caller-shaped payload with a strict 200 check and
    /// return the raw response body, so pass-through responses stay
    /// byte-identical. Unknown request fields survive untouched.
    pub async fn forward_raw(&self, authorization: &str, payload: &Value) -> Result<String> {
        let url = self.url();
        debug!(model = %self.model, %url, "llm chat request");
        let send = async {
            let resp = self
                .http
                .post(&url)
                .header("Authorization", authorization)
                .header("Content-Type", "application/json; charset=utf-8")
                .json(payload)
                .send()
                .await
                .map_err(RagwayError::transport)?;

            let status = resp.status();
            if status != reqwest::StatusCode::OK {
                let body = resp.text().await.unwrap_or_default();
                return Err(RagwayError::Remote {
                    status: status.as_u16(),
                    body,
                    url: url.clone(),
                });
            }
            resp.text().await.map_err(RagwayError::transport)
        };
        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| RagwayError::Transport(format!("llm call timed out: {}", self.url())))?
    }

    /// Non-streaming chat call.
    pub async fn chat_raw(
        &self,
        authorization: &str,
        messages: &[Message],
    ) -> Result<CompletionResponse> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        let raw = self.forward_raw(authorization, &payload).await?;
        serde_json::from_str(&raw).map_err(RagwayError::decode)
    }

    /// Open a streaming chat call. Forces `stream=true` and
    /// `stream_options.include_usage=true` on the payload, enforces the
    /// status check, and hands back the raw response for line pumping. Only
    /// the header phase is clock-bounded.
    pub async fn open_stream(
        &self,
        authorization: &str,
        payload: &Value,
    ) -> Result<reqwest::Response> {
        let mut payload = payload.clone();
        payload["stream"] = json!(true);
        payload["stream_options"] = json!({ "include_usage": true });

        let url = self.url();
        debug!(model = %self.model, %url, "llm streaming request");
        let open = async {
            let resp = self
                .http
                .post(&url)
                .header("Authorization", authorization)
                .header("Content-Type", "application/json; charset=utf-8")
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
                    url: url.clone(),
                });
            }
            Ok(resp)
        };
        tokio::time::timeout(self.timeout, open)
            .await
            .map_err(|_| RagwayError::Transport(format!("llm stream open timed out: {}", self.url())))?
    }

    /// Pump every non-empty line of an open stream through `on_line`,
    /// byte-exact including the `data: ` prefix and empty-payload
    /// heartbeats. Blank separator lines are skipped.
    pub async fn pump_lines<F: FnMut(&str)>(resp: reqwest::Response, mut on_line: F) -> Result<()> {
        let mut assembler = LineAssembler::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(RagwayError::transport)?;
            for line in assembler.push(&chunk) {
                if !line.is_empty() {
                    on_line(&line);
                }
            }
        }
        if let Some(line) = assembler.finish() {
            if !line.is_empty() {
                on_line(&line);
            }
        }
        Ok(())
    }

    /// Streaming chat call: open, then deliver every line to `on_line`.
    pub async fn chat_stream_raw<F: FnMut(&str)>(
        &self,
        authorization: &str,
        messages: &[Message],
        on_line: F,
    ) -> Result<()> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
        });
        let resp = self.open_stream(authorization, &payload).await?;
        Self::pump_lines(resp, on_line).await
    }

    /// Convenience: prepend a system prompt, call non-streaming, return the
    /// first choice's content.
    pub async fn generate_content(
        &self,
        authorization: &str,
        system_prompt: &str,
        user_messages: &[Message],
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(user_messages.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend_from_slice(user_messages);
        let resp = self.chat_raw(authorization, &messages).await?;
        Ok(resp.first_content())
    }
}

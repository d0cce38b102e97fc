//! Log-sink client: single-stream push in the Loki wire shape, expecting
//! 204 on success.

use std::time::Duration;

use ragway_core::prompts::CATEGORY_UNKNOWN;
use ragway_core::{RagwayError, Result};
use serde_json::json;
use tracing::debug;

use crate::chatlog::ChatLog;

const SHIP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LogSinkClient {
    client: reqwest::Client,
    endpoint: String,
}

impl LogSinkClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SHIP_TIMEOUT)
            .build()
            .map_err(RagwayError::transport)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Ship one serialized record. `line` is the exact body that was (or
    /// will be) written to disk, minus the trailing newline.
    pub async fn ship(&self, record: &ChatLog, line: &str) -> Result<()> {
        let ts_ns = record
            .timestamp
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string();
        let body = json!({
            "streams": [{
                "stream": {
                    "job": "ragway",
                    "user": record.identity.user_name,
                    "client_ide": record.identity.client_ide,
                    "model": record.model,
                    "category": record.category.as_deref().unwrap_or(CATEGORY_UNKNOWN),
                },
                "values": [[ts_ns, line]],
            }]
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(RagwayError::transport)?;

        let status = resp.status();
        if status != reqwest::StatusCode::NO_CONTENT {
            let body = resp.text().await.unwrap_or_default();
            return Err(RagwayError::Remote {
                status: status.as_u16(),
                body,
                url: self.endpoint.clone(),
            });
        }
        debug!(user = %record.identity.user_name, "chat log shipped");
        Ok(())
    }
}

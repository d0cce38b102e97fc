//! Knowledge-base search: POST with a caller-shaped body, semantic-shaped
//! results back.

use std::time::Duration;

use ragway_core::Result;
use tracing::debug;

use crate::http::{check_ready, map_reqwest, send_json, with_headers};
use crate::types::{ApiEnvelope, RetrievalContext, SemanticData, SemanticResult};

pub struct KnowledgeClient {
    client: reqwest::Client,
    search_endpoint: String,
    ready_endpoint: String,
}

impl KnowledgeClient {
    pub fn new(
        search_endpoint: impl Into<String>,
        ready_endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(map_reqwest)?;
        Ok(Self {
            client,
            search_endpoint: search_endpoint.into(),
            ready_endpoint: ready_endpoint.into(),
        })
    }

    /// The knowledge service accepts the full request body as-is, so the
    /// caller passes pre-built JSON rather than typed fields.
    pub async fn search(
        &self,
        ctx: &RetrievalContext,
        body: &serde_json::Value,
    ) -> Result<Vec<SemanticResult>> {
        debug!(endpoint = %self.search_endpoint, "knowledge search");
        let req = with_headers(self.client.post(&self.search_endpoint).json(body), ctx);
        let envelope: ApiEnvelope<SemanticData> = send_json(req).await?;
        Ok(envelope.data.map(|d| d.list).unwrap_or_default())
    }

    pub async fn check_ready(&self, ctx: &RetrievalContext) -> bool {
        check_ready(&self.client, &self.ready_endpoint, ctx).await
    }
}

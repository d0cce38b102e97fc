//! Semantic code search: POST with a JSON body, score-ranked chunk list back.

use std::time::Duration;

use ragway_core::Result;
use serde::Serialize;
use tracing::debug;

use crate::http::{check_ready, map_reqwest, send_json, with_headers};
use crate::types::{ApiEnvelope, RetrievalContext, SemanticData, SemanticResult};

pub struct SemanticClient {
    client: reqwest::Client,
    search_endpoint: String,
    ready_endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SemanticBody<'a> {
    client_id: &'a str,
    codebase_path: &'a str,
    query: &'a str,
    top_k: u32,
    score_threshold: f64,
    authorization: &'a str,
}

impl SemanticClient {
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

    /// Run one semantic query. Returns the raw result list; score filtering
    /// is the caller's policy.
    pub async fn search(
        &self,
        ctx: &RetrievalContext,
        query: &str,
        top_k: u32,
        score_threshold: f64,
    ) -> Result<Vec<SemanticResult>> {
        let body = SemanticBody {
            client_id: &ctx.client_id,
            codebase_path: &ctx.codebase_path,
            query,
            top_k,
            score_threshold,
            authorization: &ctx.authorization,
        };
        debug!(endpoint = %self.search_endpoint, top_k, "semantic search");
        let req = with_headers(self.client.post(&self.search_endpoint).json(&body), ctx);
        let envelope: ApiEnvelope<SemanticData> = send_json(req).await?;
        Ok(envelope.data.map(|d| d.list).unwrap_or_default())
    }

    pub async fn check_ready(&self, ctx: &RetrievalContext) -> bool {
        check_ready(&self.client, &self.ready_endpoint, ctx).await
    }
}

//! Reference lookup: GET with query parameters, a call tree back.

use std::time::Duration;

use ragway_core::Result;
use tracing::debug;

use crate::http::{check_ready, map_reqwest, send_json, with_headers};
use crate::types::{ApiEnvelope, ReferenceNode, RetrievalContext};

pub struct ReferenceClient {
    client: reqwest::Client,
    search_endpoint: String,
    ready_endpoint: String,
}

#[derive(Debug, Clone)]
pub struct ReferenceQuery {
    pub file_path: String,
    /// `"start-end"` when present.
    pub line_range: Option<String>,
    pub symbol_name: Option<String>,
    /// Maximum tree depth the service should expand.
    pub max_layer: Option<u32>,
}

impl ReferenceClient {
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

    pub async fn search(
        &self,
        ctx: &RetrievalContext,
        query: &ReferenceQuery,
    ) -> Result<Vec<ReferenceNode>> {
        let mut params: Vec<(&str, String)> = vec![
            ("clientId", ctx.client_id.clone()),
            ("codebasePath", ctx.codebase_path.clone()),
            ("filePath", query.file_path.clone()),
        ];
        if let Some(range) = &query.line_range {
            params.push(("lineRange", range.clone()));
        }
        if let Some(symbol) = &query.symbol_name {
            params.push(("symbolName", symbol.clone()));
        }
        if let Some(layer) = query.max_layer {
            params.push(("maxLayer", layer.to_string()));
        }
        debug!(endpoint = %self.search_endpoint, file = %query.file_path, "reference search");
        let req = with_headers(self.client.get(&self.search_endpoint).query(&params), ctx);
        let envelope: ApiEnvelope<Vec<ReferenceNode>> = send_json(req).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    pub async fn check_ready(&self, ctx: &RetrievalContext) -> bool {
        check_ready(&self.client, &self.ready_endpoint, ctx).await
    }
}

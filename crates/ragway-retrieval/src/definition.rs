//! Definition lookup: GET with query parameters, symbol definitions back.

use std::time::Duration;

use ragway_core::Result;
use tracing::debug;

use crate::http::{check_ready, map_reqwest, send_json, with_headers};
use crate::types::{ApiEnvelope, Definition, DefinitionData, RetrievalContext};

pub struct DefinitionClient {
    client: reqwest::Client,
    search_endpoint: String,
    ready_endpoint: String,
}

/// Optional narrowing for a definition query.
#[derive(Debug, Default, Clone)]
pub struct DefinitionQuery {
    pub file_path: Option<String>,
    /// Comma-joined when sent.
    pub symbol_names: Vec<String>,
}

impl DefinitionClient {
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
        query: &DefinitionQuery,
    ) -> Result<Vec<Definition>> {
        let mut params: Vec<(&str, String)> = vec![
            ("clientId", ctx.client_id.clone()),
            ("codebasePath", ctx.codebase_path.clone()),
        ];
        if let Some(fp) = &query.file_path {
            params.push(("filePath", fp.clone()));
        }
        if !query.symbol_names.is_empty() {
            params.push(("symbolNames", query.symbol_names.join(",")));
        }
        debug!(endpoint = %self.search_endpoint, "definition search");
        let req = with_headers(self.client.get(&self.search_endpoint).query(&params), ctx);
        let envelope: ApiEnvelope<DefinitionData> = send_json(req).await?;
        Ok(envelope.data.map(|d| d.list).unwrap_or_default())
    }

    pub async fn check_ready(&self, ctx: &RetrievalContext) -> bool {
        check_ready(&self.client, &self.ready_endpoint, ctx).await
    }
}

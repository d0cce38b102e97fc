//! Shared request plumbing for the retrieval clients.

use ragway_core::{RagwayError, Result};
use serde::de::DeserializeOwned;

use crate::types::RetrievalContext;

/// Map a reqwest failure into the transport/decode taxonomy.
pub(crate) fn map_reqwest(err: reqwest::Error) -> RagwayError {
    if err.is_decode() {
        RagwayError::decode(err)
    } else {
        RagwayError::transport(err)
    }
}

/// Attach the standard retrieval headers.
pub(crate) fn with_headers(
    req: reqwest::RequestBuilder,
    ctx: &RetrievalContext,
) -> reqwest::RequestBuilder {
    let req = req
        .header("Authorization", ctx.authorization.as_str())
        .header("Content-Type", "application/json");
    if ctx.client_version.is_empty() {
        req
    } else {
        req.header("client-version", ctx.client_version.as_str())
    }
}

/// Send the request, enforce 2xx, decode JSON. Non-2xx captures the body
/// into a `Remote` error; malformed payloads become `Decode`.
pub(crate) async fn send_json<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T> {
    let resp = req.send().await.map_err(map_reqwest)?;
    let url = resp.url().to_string();
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RagwayError::Remote {
            status: status.as_u16(),
            body,
            url,
        });
    }
    let body = resp.text().await.map_err(map_reqwest)?;
    serde_json::from_str(&body).map_err(RagwayError::decode)
}

/// Readiness probe shared by every client: `200` means healthy, any other
/// outcome (status or transport) means not ready.
pub(crate) async fn check_ready(
    client: &reqwest::Client,
    endpoint: &str,
    ctx: &RetrievalContext,
) -> bool {
    if endpoint.is_empty() {
        return false;
    }
    let req = with_headers(
        client.get(endpoint).query(&[
            ("clientId", ctx.client_id.as_str()),
            ("codebasePath", ctx.codebase_path.as_str()),
        ]),
        ctx,
    );
    match req.send().await {
        Ok(resp) => resp.status() == reqwest::StatusCode::OK,
        Err(_) => false,
    }
}

//! GET /health: gateway liveness, plus optional retrieval readiness when
//! the caller names a codebase to probe.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use ragway_retrieval::types::RetrievalContext;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    #[serde(rename = "codebasePath")]
    pub codebase_path: Option<String>,
}

pub async fn health_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HealthQuery>,
    headers: HeaderMap,
) -> Json<Value> {
    let mut body = json!({ "status": "ok", "model": state.llm.model() });

    if let (Some(client_id), Some(codebase_path)) = (query.client_id, query.codebase_path) {
        let ctx = RetrievalContext {
            client_id,
            codebase_path,
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            client_version: String::new(),
        };

        let semantic = match &state.semantic {
            Some(c) => json!(c.check_ready(&ctx).await),
            None => Value::Null,
        };
        let definition = match &state.definition {
            Some(c) => json!(c.check_ready(&ctx).await),
            None => Value::Null,
        };
        let reference = match &state.reference {
            Some(c) => json!(c.check_ready(&ctx).await),
            None => Value::Null,
        };
        let knowledge = match &state.knowledge {
            Some(c) => json!(c.check_ready(&ctx).await),
            None => Value::Null,
        };

        body["retrieval"] = json!({
            "semantic": semantic,
            "definition": definition,
            "reference": reference,
            "knowledge": knowledge,
        });
    }

    Json(body)
}

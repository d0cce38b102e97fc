use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use ragway_core::config::RagwayConfig;
use ragway_core::tokenizer::Tokenizer;
use ragway_core::Result;
use ragway_llm::LlmClient;
use ragway_pipeline::{BackgroundTasks, ChainBuilder, SystemPromptCache};
use ragway_retrieval::{DefinitionClient, KnowledgeClient, ReferenceClient, SemanticClient};
use ragway_telemetry::{ChatLogSpool, MetricsReporter};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Per-task ceiling for fire-and-forget work (guideline compression,
/// metrics reporting).
const BACKGROUND_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RagwayConfig,
    pub llm: Arc<LlmClient>,
    pub tokenizer: Arc<Tokenizer>,
    pub chains: ChainBuilder,
    pub spool: Arc<ChatLogSpool>,
    pub reporter: Option<Arc<MetricsReporter>>,
    pub background: Arc<BackgroundTasks>,
    pub semantic: Option<Arc<SemanticClient>>,
    pub definition: Option<Arc<DefinitionClient>>,
    pub reference: Option<Arc<ReferenceClient>>,
    pub knowledge: Option<Arc<KnowledgeClient>>,
}

impl AppState {
    pub fn new(config: RagwayConfig, shutdown: CancellationToken) -> Result<Self> {
        let tokenizer = Arc::new(Tokenizer::from_config(&config.tokenizer)?);
        let llm = Arc::new(LlmClient::from_config(&config.llm)?);

        let summary_llm = match LlmClient::from_summary_config(&config.summary_llm) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "summary model unavailable, RAG chain degraded");
                None
            }
        };

        let retrieval = &config.retrieval;
        let semantic = build_client(retrieval.semantic.search_endpoint.is_empty(), "semantic", || {
            SemanticClient::new(
                &retrieval.semantic.search_endpoint,
                &retrieval.semantic.ready_endpoint,
                Duration::from_secs(retrieval.semantic.timeout_secs),
            )
        });
        let definition = build_client(
            retrieval.definition.search_endpoint.is_empty(),
            "definition",
            || {
                DefinitionClient::new(
                    &retrieval.definition.search_endpoint,
                    &retrieval.definition.ready_endpoint,
                    Duration::from_secs(retrieval.definition.timeout_secs),
                )
            },
        );
        let reference = build_client(
            retrieval.reference.search_endpoint.is_empty(),
            "reference",
            || {
                ReferenceClient::new(
                    &retrieval.reference.search_endpoint,
                    &retrieval.reference.ready_endpoint,
                    Duration::from_secs(retrieval.reference.timeout_secs),
                )
            },
        );
        let knowledge = build_client(
            retrieval.knowledge.search_endpoint.is_empty(),
            "knowledge",
            || {
                KnowledgeClient::new(
                    &retrieval.knowledge.search_endpoint,
                    &retrieval.knowledge.ready_endpoint,
                    Duration::from_secs(retrieval.knowledge.timeout_secs),
                )
            },
        );

        let background = Arc::new(BackgroundTasks::new(BACKGROUND_TASK_TIMEOUT));
        let chains = ChainBuilder::new(
            semantic.clone(),
            summary_llm,
            tokenizer.clone(),
            Arc::new(SystemPromptCache::new()),
            background.clone(),
            config.prompt.clone(),
            config.retrieval.semantic.clone(),
            config.summary_llm.api_key.clone(),
        );

        let spool = Arc::new(ChatLogSpool::new(
            &config.log.file_path,
            config.log.queue_size,
            shutdown,
        ));

        let reporter = match &config.metrics.report_url {
            Some(url) => match MetricsReporter::new(url) {
                Ok(r) => Some(Arc::new(r)),
                Err(e) => {
                    warn!(error = %e, "metrics reporter unavailable");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            config,
            llm,
            tokenizer,
            chains,
            spool,
            reporter,
            background,
            semantic,
            definition,
            reference,
            knowledge,
        })
    }
}

fn build_client<T>(
    unconfigured: bool,
    kind: &str,
    build: impl FnOnce() -> Result<T>,
) -> Option<Arc<T>> {
    if unconfigured {
        return None;
    }
    match build() {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, kind, "retrieval client construction failed");
            None
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(crate::http::chat::chat_completions),
        )
        .route("/health", get(crate::http::health::health_handler))
        .route("/metrics", get(ragway_telemetry::metrics::metrics_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ragway_core::config::RagwayConfig;
use ragway_llm::LlmClient;
use ragway_telemetry::{LogProcessor, LogSinkClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod app;
mod forward;
mod http;
mod idle;

#[derive(Parser)]
#[command(name = "ragway-gateway", about = "Retrieval-augmented chat gateway")]
struct Args {
    /// Path to the YAML config file. Falls back to RAGWAY_CONFIG, then
    /// ./ragway.yaml.
    #[arg(long, short)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragway_gateway=info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("RAGWAY_CONFIG").ok());
    let config = RagwayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        RagwayConfig::default()
    });

    ragway_telemetry::metrics::init_metrics()?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(app::AppState::new(config.clone(), shutdown.clone())?);

    // Log sweep: classify → ship → metrics → promote → delete.
    let classifier = match LlmClient::from_summary_config(&config.summary_llm) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "classifier model unavailable, records stay unclassified");
            None
        }
    };
    let sink = match &config.log.sink_endpoint {
        Some(endpoint) => match LogSinkClient::new(endpoint) {
            Ok(sink) => Some(sink),
            Err(e) => {
                warn!(error = %e, "log sink unavailable, shipping disabled");
                None
            }
        },
        None => None,
    };
    let processor = Arc::new(LogProcessor::new(
        &config.log.file_path,
        Duration::from_secs(config.log.scan_interval_secs),
        classifier,
        config.summary_llm.api_key.clone().unwrap_or_default(),
        sink,
    ));
    let processor_handle = processor.start(state.spool.clone(), shutdown.clone());

    let router = app::build_router(state.clone());
    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ragway gateway listening on {addr}");

    let signal_token = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            signal_token.cancel();
        })
        .await?;

    // Drain: spooled records first, then the sweep task and the
    // fire-and-forget executor.
    state.spool.join().await;
    let _ = processor_handle.await;
    state.background.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

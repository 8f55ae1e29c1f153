use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use discovery_orchestrator::adapters::llm_anthropic::AnthropicLlm;
use discovery_orchestrator::adapters::mock::{InMemoryDiscoveryStore, MockCorpusSearch, MockLlm};
use discovery_orchestrator::adapters::sqlite_store::SqliteDiscoveryStore;
use discovery_orchestrator::adapters::{CorpusSearch, DiscoveryStore, Llm};
use discovery_orchestrator::config::Config;
use discovery_orchestrator::http::{build_router, AppState};
use discovery_orchestrator::orchestrator::Orchestrator;
use discovery_orchestrator::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = Config::from_env();
    tracing::info!(port = config.port, "starting discovery orchestrator");

    if config.has_corpus_backend() {
        tracing::warn!(
            "DATABASE_URL set but no live vector-search corpus adapter is wired in; using mock corpus search"
        );
    }
    let corpus: Arc<dyn CorpusSearch> = Arc::new(MockCorpusSearch);

    let llm: Arc<dyn Llm> = match config.anthropic_api_key.clone() {
        Some(api_key) => {
            tracing::info!("ANTHROPIC_API_KEY configured, using live Anthropic adapter");
            Arc::new(AnthropicLlm::new(api_key))
        }
        None => {
            tracing::info!("no LLM backend configured, using mock LLM");
            Arc::new(MockLlm)
        }
    };

    let store: Arc<dyn DiscoveryStore> = match &config.database_url {
        Some(path) => {
            tracing::info!(path, "opening sqlite discovery store");
            Arc::new(
                SqliteDiscoveryStore::open(Path::new(path)).context("failed to open sqlite discovery store")?,
            )
        }
        None => {
            tracing::info!("no DATABASE_URL configured, using in-memory discovery store");
            Arc::new(InMemoryDiscoveryStore::default())
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(corpus, None, llm, store.clone(), config.session_cap));

    let shutdown = CancellationToken::new();
    Scheduler::new(Arc::clone(&orchestrator)).spawn(shutdown.clone());

    let app_state = Arc::new(AppState { orchestrator, store });
    let app = build_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal(cancellation: CancellationToken) {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    tracing::info!("shutdown signal received");
    cancellation.cancel();
}

//! Lectern API Gateway
//!
//! The single entry point for all external requests.
//! Handles:
//! - Request routing and validation
//! - Multipart upload handling
//! - Observability (logging, metrics, tracing)
//!
//! All state is process-local: the session store and the lexical index are
//! shared behind `Arc` and assume callers serialize requests per session.

mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use lectern_common::{config::AppConfig, metrics, session::SessionStore};
use lectern_context::{AnswerOrchestrator, AnswerService, ChatCompletionsAnswerer};
use lectern_ingestion::{ChunkerConfig, DocumentProcessor};
use lectern_search::{AcademicSearch, LexicalIndex};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub processor: Arc<DocumentProcessor>,
    pub orchestrator: Arc<AnswerOrchestrator>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;
    let config = Arc::new(config);

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting Lectern API Gateway v{}", lectern_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(addr = %addr, "Prometheus exporter listening");
    }

    // Build shared state
    let sessions = Arc::new(SessionStore::new());
    let index = Arc::new(load_index(&config));

    let processor = Arc::new(DocumentProcessor::new(
        sessions.clone(),
        index.clone(),
        &config.storage.upload_dir,
        ChunkerConfig::default(),
    )?);

    let academic = Arc::new(AcademicSearch::new(&config.academic));
    let answerer = AnswerService::new(
        Arc::new(ChatCompletionsAnswerer::new(config.answer.clone())),
        config.answer.clone(),
    );
    let orchestrator = Arc::new(AnswerOrchestrator::new(
        sessions.clone(),
        index.clone(),
        academic,
        answerer,
        config.retrieval.top_k,
        config.academic.max_results,
    ));

    let state = AppState {
        sessions,
        processor,
        orchestrator,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Persist the index so a restart picks up where this run left off
    if let Some(snapshot) = &config.storage.index_snapshot {
        if let Err(e) = index.persist(Path::new(snapshot)) {
            tracing::warn!(path = %snapshot, error = %e, "Failed to persist index snapshot");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Restore the index snapshot when one is configured and present
fn load_index(config: &AppConfig) -> LexicalIndex {
    if let Some(snapshot) = &config.storage.index_snapshot {
        let path = Path::new(snapshot);
        if path.exists() {
            match LexicalIndex::restore(path) {
                Ok(index) => return index,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to restore index snapshot, starting empty");
                }
            }
        }
    }
    LexicalIndex::new()
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        // Health endpoints
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        // Document endpoints
        .route("/upload", post(handlers::upload::upload))
        .route("/files", get(handlers::files::list_files))
        .route("/file/{file_id}", delete(handlers::files::delete_file))
        // Query endpoint
        .route("/query", post(handlers::query::query))
        // Session endpoint
        .route("/session", delete(handlers::files::clear_session))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

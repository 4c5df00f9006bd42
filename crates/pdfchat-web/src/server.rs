//! HTTP server setup: router and listener

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use pdfchat_rag::KnowledgeBase;

use crate::handlers;
use crate::state::AppState;

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

/// Largest accepted upload request
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/session", get(handlers::session_state));

    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload))
        .route("/delete", post(handlers::delete))
        .route("/chat", post(handlers::chat))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the web shell until Ctrl-C
pub async fn serve(bind: SocketAddr, knowledge_base: Arc<KnowledgeBase>) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(knowledge_base)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(%error, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

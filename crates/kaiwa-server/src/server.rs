use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::handlers::{self, AppState};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

/// Build the Axum router with all routes. CORS stays permissive: the
/// browser front end is served from another origin.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/summarize", post(handlers::summarize))
        .route("/api/refine", post(handlers::refine))
        .route("/api/compose", post(handlers::compose))
        .route("/api/podcast_audio", post(handlers::podcast_audio))
        .route("/api/tts", post(handlers::tts))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Port 0 binds a random free port.
pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "kaiwa server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

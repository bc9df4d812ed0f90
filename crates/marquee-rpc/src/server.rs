//! HTTP server implementation using Axum.

use crate::handlers::{handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use marquee_library::MarqueeApi;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Requests handled at the same time; saves decode full-size images.
const MAX_IN_FLIGHT: usize = 32;

/// Application state shared across handlers.
pub struct AppState {
    pub api: MarqueeApi,
}

/// Build the router over an API instance.
pub fn router(api: MarqueeApi) -> Router {
    let state = Arc::new(AppState { api });

    // Configure CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
                .layer(cors),
        )
        .with_state(state)
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(api: MarqueeApi, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let app = router(api);

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    // Bind to the address
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_library::LibraryConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_server_starts() {
        let temp_dir = TempDir::new().unwrap();
        let movies = temp_dir.path().join("movies");
        std::fs::create_dir_all(&movies).unwrap();
        let api = MarqueeApi::builder(LibraryConfig::new(temp_dir.path().join("data")))
            .movie_root(&movies)
            .build()
            .await
            .unwrap();

        let addr = start_server(api, "127.0.0.1", 0).await.unwrap();
        assert!(addr.port() > 0);
    }
}

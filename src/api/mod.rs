//! HTTP server module
//!
//! Serves the upload endpoint, the WebSocket job channel and the published
//! files themselves.

use crate::{FileHost, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the router with all route definitions
///
/// # Routes
///
/// - `GET /fromurl` - WebSocket job channel
/// - `POST /upload` - Multipart upload, returns the public URL as text
/// - `GET /health` - Health check
/// - anything else - Static files from the publish directory
pub fn create_router(host: Arc<FileHost>) -> Router {
    let state = AppState::new(host);
    let config = Arc::clone(&state.config);

    let router = Router::new()
        .route("/fromurl", get(routes::job_channel))
        .route(
            "/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(config.server.max_upload_bytes)),
        )
        .route("/health", get(routes::health_check))
        .fallback_service(ServeDir::new(&config.storage.publish_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.server.cors_enabled {
        let cors = build_cors_layer(&config.server.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Supports "*" for any origin; an empty list also allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the server on the configured bind address.
///
/// Runs until SIGINT or SIGTERM, then stops accepting connections and waits
/// for open requests to finish.
///
/// # Example
///
/// ```no_run
/// use filedrop::{Config, FileHost};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let host = Arc::new(FileHost::new(Config::default()).await?);
///
/// // Blocks until shutdown
/// filedrop::api::start_server(host).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_server(host: Arc<FileHost>) -> Result<()> {
    let bind_address = host.config().server.bind_address;

    tracing::info!(address = %bind_address, "Starting server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    serve(listener, host, crate::wait_for_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, host: Arc<FileHost>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(address) = listener.local_addr() {
        tracing::info!(address = %address, "Server listening");
    }

    let app = create_router(host);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("Server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

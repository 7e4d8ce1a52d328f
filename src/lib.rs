//! # filedrop
//!
//! Personal file-hosting service: users upload files, submit remote URLs or
//! submit magnet links, and get a short shareable link back.
//!
//! ## Overview
//!
//! - [`IdAllocator`] issues short, collision-free identifiers and records them
//!   in an append-only log
//! - [`fetch`] runs URL and swarm fetch jobs into the publish directory
//! - [`ProgressReporter`] streams progress samples while a job runs
//! - [`archive`] bundles a finished swarm download into one tar file
//! - [`JobSession`] multiplexes concurrent jobs over one client connection
//! - [`api`] serves uploads, the WebSocket job channel and the published files
//!
//! ## Quick Start
//!
//! ```no_run
//! use filedrop::{Config, FileHost};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.server.public_https = false;
//!
//!     let host = Arc::new(FileHost::new(config).await?);
//!
//!     // Serve until SIGINT/SIGTERM
//!     filedrop::api::start_server(host).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP server
pub mod api;
/// Directory archiving
pub mod archive;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// URL and swarm fetch jobs
pub mod fetch;
/// Service root
pub mod host;
/// Identifier allocation
pub mod ids;
/// Progress sampling
pub mod progress;
/// Per-connection job sessions
pub mod session;
/// Swarm engine seam
pub mod swarm;
/// Job channel message types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, IdConfig, JobConfig, ServerConfig, StorageConfig};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use fetch::{MagnetLink, Source, SwarmFetch, UrlFetch};
pub use host::{FileHost, StoredUpload};
pub use ids::{IdAllocator, Identifier};
pub use progress::{Outbound, ProgressProbe, ProgressReporter};
pub use session::{Frame, JobSession, SessionSummary};
pub use swarm::{NoSwarmEngine, SwarmEngine, SwarmStatus, SwarmTorrent};
pub use types::{
    CorrelationTag, FetchRequest, JobFailure, JobMessage, ProgressSample, PublishedFile,
};

/// Wait for a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut remaining), Err(e)) | (Err(e), Ok(mut remaining)) => {
            tracing::warn!(error = %e, "Could not register one signal handler, waiting on the other");
            remaining.recv().await;
            tracing::info!("Received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}

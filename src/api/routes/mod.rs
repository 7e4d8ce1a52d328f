//! Route handlers for the HTTP server
//!
//! - [`upload`]: multipart uploads
//! - [`job_channel`]: WebSocket job channel
//! - [`health_check`]: health check

use super::state::AppState;
use axum::http::{HeaderMap, header};

mod jobs;
mod system;
mod upload;

pub use jobs::*;
pub use system::*;
pub use upload::*;

/// Host used in public links: the request's `Host` header, else the bind address
pub(crate) fn public_host(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.server.bind_address.to_string())
}

//! Application state for the HTTP server

use crate::{Config, FileHost};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clones).
#[derive(Clone)]
pub struct AppState {
    /// The file-hosting service
    pub host: Arc<FileHost>,

    /// Configuration snapshot taken when the router was built
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(host: Arc<FileHost>) -> Self {
        let config = Arc::new(host.config().clone());
        Self { host, config }
    }
}

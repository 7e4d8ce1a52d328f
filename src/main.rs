//! filedrop server binary
//!
//! Reads a JSON config from the file named by `FILEDROP_CONFIG` (defaults
//! otherwise) and serves until SIGINT/SIGTERM. Log filtering follows
//! `RUST_LOG`.

use filedrop::{Config, FileHost};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "FILEDROP_CONFIG";
const DEFAULT_LOG_FILTER: &str = "filedrop=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            tracing::info!(path = %path.display(), "loading configuration");
            Config::from_file(&path)?
        }
        None => Config::default(),
    };

    let host = Arc::new(FileHost::new(config).await?);
    filedrop::api::start_server(host).await?;
    Ok(())
}

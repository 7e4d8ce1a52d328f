//! Traits and types for driving a swarm engine

use crate::fetch::MagnetLink;
use async_trait::async_trait;
use std::path::Path;

/// A torrent registered with an engine, with its metadata resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmTorrent {
    /// Engine-specific handle key
    pub key: usize,
    /// Torrent name from the resolved metadata
    pub name: String,
    /// Total payload size in bytes
    pub total_bytes: u64,
}

/// Point-in-time download state of a registered torrent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwarmStatus {
    /// Total payload size in bytes
    pub total_bytes: u64,
    /// Bytes verified and written so far
    pub completed_bytes: u64,
}

impl SwarmStatus {
    /// Bytes still to download
    pub fn bytes_missing(&self) -> u64 {
        self.total_bytes.saturating_sub(self.completed_bytes)
    }

    /// Whether every piece is present
    pub fn is_complete(&self) -> bool {
        self.bytes_missing() == 0
    }
}

/// Peer-to-peer download engine driven by swarm fetch jobs
///
/// The engine is a black box: jobs register a magnet, watch its status,
/// wait for completion and release it. Implementations must be download-only;
/// a released torrent is never seeded.
///
/// # Examples
///
/// ```no_run
/// use filedrop::fetch::MagnetLink;
/// use filedrop::swarm::{NoSwarmEngine, SwarmEngine};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = NoSwarmEngine;
/// let magnet = MagnetLink::parse("magnet:?xt=urn:btih:cab507494d02ebb1178b38f2e9d7be299c86b862")?;
///
/// // The stub engine refuses every registration
/// assert!(engine.add_magnet(&magnet, Path::new("torrent_tmp/abcd")).await.is_err());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SwarmEngine: Send + Sync {
    /// Register a magnet, storing pieces under `work_dir`, and wait for its metadata.
    ///
    /// Callers bound this with their own timeout; the engine may wait indefinitely
    /// for a peer that advertises the metadata.
    async fn add_magnet(&self, magnet: &MagnetLink, work_dir: &Path)
    -> crate::Result<SwarmTorrent>;

    /// Current download state
    fn status(&self, torrent: &SwarmTorrent) -> crate::Result<SwarmStatus>;

    /// Resolve once every piece has been downloaded
    async fn wait_until_completed(&self, torrent: &SwarmTorrent) -> crate::Result<()>;

    /// Release the registration. Downloaded data stays on disk.
    async fn remove(&self, torrent: &SwarmTorrent) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

//! Stub swarm engine for builds without torrent support

use super::traits::{SwarmEngine, SwarmStatus, SwarmTorrent};
use crate::fetch::MagnetLink;
use async_trait::async_trait;
use std::path::Path;

/// Swarm engine used when no real engine is compiled in
///
/// Every registration fails with `Error::NotSupported`, so magnet jobs get a
/// failure message while URL jobs keep working.
pub struct NoSwarmEngine;

const UNAVAILABLE: &str = "torrent downloads require building with the `torrent` feature";

#[async_trait]
impl SwarmEngine for NoSwarmEngine {
    async fn add_magnet(
        &self,
        _magnet: &MagnetLink,
        _work_dir: &Path,
    ) -> crate::Result<SwarmTorrent> {
        Err(crate::Error::NotSupported(UNAVAILABLE.into()))
    }

    fn status(&self, _torrent: &SwarmTorrent) -> crate::Result<SwarmStatus> {
        Err(crate::Error::NotSupported(UNAVAILABLE.into()))
    }

    async fn wait_until_completed(&self, _torrent: &SwarmTorrent) -> crate::Result<()> {
        Err(crate::Error::NotSupported(UNAVAILABLE.into()))
    }

    async fn remove(&self, _torrent: &SwarmTorrent) -> crate::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

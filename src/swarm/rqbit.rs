//! Swarm engine backed by librqbit

use super::traits::{SwarmEngine, SwarmStatus, SwarmTorrent};
use crate::error::{Error, Result};
use crate::fetch::MagnetLink;
use async_trait::async_trait;
use librqbit::api::TorrentIdOrHash;
use librqbit::{AddTorrent, AddTorrentOptions, ManagedTorrentHandle, Session, SessionOptions};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// librqbit session shared by all swarm jobs
///
/// Each torrent downloads into the work directory its job supplies. Torrents
/// are deleted from the session (keeping their files) when released, so the
/// service never seeds.
pub struct RqbitEngine {
    session: Arc<Session>,
    handles: Mutex<HashMap<usize, ManagedTorrentHandle>>,
}

impl RqbitEngine {
    /// Start a session whose default output folder is `default_dir`
    pub async fn new(default_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&default_dir)?;

        let session = Session::new_with_opts(default_dir.clone(), SessionOptions::default())
            .await
            .map_err(|e| Error::Swarm(format!("failed to start torrent session: {e:#}")))?;

        info!(dir = %default_dir.display(), "torrent session started");

        Ok(Self {
            session,
            handles: Mutex::new(HashMap::new()),
        })
    }

    fn handle(&self, torrent: &SwarmTorrent) -> Result<ManagedTorrentHandle> {
        let handles = self
            .handles
            .lock()
            .map_err(|_| Error::Swarm("torrent registry poisoned".into()))?;
        handles
            .get(&torrent.key)
            .cloned()
            .ok_or_else(|| Error::Swarm(format!("torrent {} is not registered", torrent.key)))
    }
}

#[async_trait]
impl SwarmEngine for RqbitEngine {
    async fn add_magnet(&self, magnet: &MagnetLink, work_dir: &Path) -> Result<SwarmTorrent> {
        let opts = AddTorrentOptions {
            overwrite: true,
            output_folder: Some(work_dir.to_string_lossy().to_string()),
            ..Default::default()
        };

        // Resolves the magnet's metadata before returning
        let response = self
            .session
            .add_torrent(AddTorrent::from_url(magnet.as_str()), Some(opts))
            .await
            .map_err(|e| Error::Swarm(format!("failed to add torrent: {e:#}")))?;

        let handle = response
            .into_handle()
            .ok_or_else(|| Error::Swarm("torrent session returned no handle".into()))?;

        let key = handle.id();
        let stats = handle.stats();
        let name = handle
            .name()
            .or_else(|| magnet.display_name().map(str::to_string))
            .unwrap_or_else(|| magnet.info_hash().to_string());

        self.handles
            .lock()
            .map_err(|_| Error::Swarm("torrent registry poisoned".into()))?
            .insert(key, handle);

        debug!(key, name = %name, total = stats.total_bytes, "torrent registered");

        Ok(SwarmTorrent {
            key,
            name,
            total_bytes: stats.total_bytes,
        })
    }

    fn status(&self, torrent: &SwarmTorrent) -> Result<SwarmStatus> {
        let stats = self.handle(torrent)?.stats();
        Ok(SwarmStatus {
            total_bytes: stats.total_bytes,
            completed_bytes: stats.progress_bytes,
        })
    }

    async fn wait_until_completed(&self, torrent: &SwarmTorrent) -> Result<()> {
        let handle = self.handle(torrent)?;
        handle
            .wait_until_completed()
            .await
            .map_err(|e| Error::Swarm(format!("torrent failed: {e:#}")))
    }

    async fn remove(&self, torrent: &SwarmTorrent) -> Result<()> {
        let removed = self
            .handles
            .lock()
            .map_err(|_| Error::Swarm("torrent registry poisoned".into()))?
            .remove(&torrent.key);

        if removed.is_some() {
            self.session
                .delete(TorrentIdOrHash::Id(torrent.key), false)
                .await
                .map_err(|e| Error::Swarm(format!("failed to release torrent: {e:#}")))?;
            debug!(key = torrent.key, "torrent released");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rqbit"
    }
}

//! Swarm (magnet) fetch jobs

use super::magnet::MagnetLink;
use crate::archive::{ARCHIVE_EXTENSION, archive_dir};
use crate::error::{Error, Result};
use crate::ids::Identifier;
use crate::progress::{Outbound, ProgressProbe, ProgressReporter, ReportTarget};
use crate::swarm::{SwarmEngine, SwarmTorrent};
use crate::types::{CorrelationTag, Published};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Timing limits for swarm jobs
#[derive(Debug, Clone, Copy)]
pub struct SwarmLimits {
    /// Interval between progress samples and stall checks
    pub progress_interval: Duration,
    /// Maximum wait for metadata resolution
    pub metadata_timeout: Duration,
    /// Maximum time without progress
    pub stall_timeout: Duration,
}

/// Downloads a magnet into a scratch directory and publishes it as one archive
pub struct SwarmFetch {
    engine: Arc<dyn SwarmEngine>,
    limits: SwarmLimits,
}

impl SwarmFetch {
    /// Create a fetcher driving `engine`
    pub fn new(engine: Arc<dyn SwarmEngine>, limits: SwarmLimits) -> Self {
        Self { engine, limits }
    }

    /// Download `magnet` into `work_dir`, archive it as `<id>.tar` in `publish_dir`.
    ///
    /// Every failure surfaces as [`Error::TransferFailed`]. The engine
    /// registration is released on every path.
    pub async fn run(
        &self,
        tag: CorrelationTag,
        magnet: &MagnetLink,
        id: &Identifier,
        work_dir: &Path,
        publish_dir: &Path,
        outbound: &Outbound,
    ) -> Result<Published> {
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(Error::transfer_failed)?;

        info!(tag, id = %id, engine = self.engine.name(), info_hash = magnet.info_hash(), "swarm fetch started");

        let torrent = match tokio::time::timeout(
            self.limits.metadata_timeout,
            self.engine.add_magnet(magnet, work_dir),
        )
        .await
        {
            Ok(added) => added.map_err(Error::transfer_failed)?,
            Err(_) => {
                return Err(Error::transfer_failed(Error::MetadataTimeout(
                    self.limits.metadata_timeout,
                )));
            }
        };

        debug!(tag, name = %torrent.name, total = torrent.total_bytes, "swarm metadata resolved");

        let registration = Registration::new(Arc::clone(&self.engine), torrent.clone());
        let mut reporter = ProgressReporter::start(
            ReportTarget {
                tag,
                total: torrent.total_bytes,
                name: torrent.name.clone(),
            },
            Arc::new(SwarmProbe {
                engine: Arc::clone(&self.engine),
                torrent: torrent.clone(),
            }),
            outbound.clone(),
            self.limits.progress_interval,
        );

        let completed = self.wait_for_completion(&torrent).await;
        match &completed {
            Ok(()) => reporter.finish().await,
            Err(_) => reporter.stop().await,
        }
        if let Err(e) = registration.release().await {
            warn!(tag, error = %e, "failed to release swarm registration");
        }
        completed.map_err(Error::transfer_failed)?;

        let archive_name = id.file_name(Some(ARCHIVE_EXTENSION));
        let summary = archive_dir(work_dir, &publish_dir.join(&archive_name))
            .await
            .map_err(Error::transfer_failed)?;

        if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
            warn!(tag, dir = %work_dir.display(), error = %e, "failed to remove swarm work directory");
        }

        info!(tag, id = %id, entries = summary.entries, "swarm fetch published");

        Ok(Published {
            file_name: archive_name.clone(),
            size: torrent.total_bytes,
            name: archive_name,
        })
    }

    /// Race the engine's completion against a stall watchdog
    async fn wait_for_completion(&self, torrent: &SwarmTorrent) -> Result<()> {
        tokio::select! {
            done = self.engine.wait_until_completed(torrent) => done,
            watched = self.stall_watch(torrent) => watched,
        }
    }

    /// Resolve `Ok` once status reports completion, or fail after `stall_timeout`
    /// without a change in completed bytes.
    async fn stall_watch(&self, torrent: &SwarmTorrent) -> Result<()> {
        let mut ticker = tokio::time::interval(self.limits.progress_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut last_completed = None;
        let mut last_change = Instant::now();

        loop {
            ticker.tick().await;
            let status = self.engine.status(torrent)?;
            if status.is_complete() {
                return Ok(());
            }

            if last_completed != Some(status.completed_bytes) {
                last_completed = Some(status.completed_bytes);
                last_change = Instant::now();
            } else if last_change.elapsed() >= self.limits.stall_timeout {
                return Err(Error::StalledTransfer {
                    idle: last_change.elapsed(),
                    completed: status.completed_bytes,
                    total: status.total_bytes,
                });
            }
        }
    }
}

/// Reads completed bytes from the engine
struct SwarmProbe {
    engine: Arc<dyn SwarmEngine>,
    torrent: SwarmTorrent,
}

#[async_trait]
impl ProgressProbe for SwarmProbe {
    async fn completed_bytes(&self) -> Option<u64> {
        self.engine
            .status(&self.torrent)
            .ok()
            .map(|status| status.completed_bytes)
    }
}

/// Engine registration that is released even if the job task unwinds
struct Registration {
    engine: Arc<dyn SwarmEngine>,
    torrent: Option<SwarmTorrent>,
}

impl Registration {
    fn new(engine: Arc<dyn SwarmEngine>, torrent: SwarmTorrent) -> Self {
        Self {
            engine,
            torrent: Some(torrent),
        }
    }

    async fn release(mut self) -> Result<()> {
        match self.torrent.take() {
            Some(torrent) => self.engine.remove(&torrent).await,
            None => Ok(()),
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(torrent) = self.torrent.take() else {
            return;
        };
        let engine = Arc::clone(&self.engine);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = engine.remove(&torrent).await {
                    warn!(key = torrent.key, error = %e, "failed to release abandoned swarm registration");
                }
            });
        }
    }
}

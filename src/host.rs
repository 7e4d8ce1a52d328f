//! Service root
//!
//! [`FileHost`] owns everything shared across connections: the identifier
//! allocator, the HTTP client, the swarm engine and the optional job-slot
//! semaphore. Uploads and fetch jobs both go through it.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{Source, SwarmFetch, SwarmLimits, UrlFetch};
use crate::ids::{IdAllocator, Identifier};
use crate::progress::Outbound;
use crate::swarm::SwarmEngine;
use crate::types::{CorrelationTag, FetchRequest, JobFailure, JobMessage, Published};
use crate::utils::{extension_from_name, extension_from_url, public_url};
use futures::{Stream, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Connect timeout for outbound URL fetches
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A file written to the publish directory by an upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredUpload {
    /// Identifier allocated for the upload
    pub id: Identifier,
    /// Stored filename in the publish directory
    pub file_name: String,
    /// Bytes written
    pub size: u64,
}

/// The file-hosting service
pub struct FileHost {
    config: Arc<Config>,
    ids: IdAllocator,
    url_fetch: UrlFetch,
    swarm_fetch: SwarmFetch,
    engine_name: &'static str,
    job_slots: Option<Arc<Semaphore>>,
}

impl FileHost {
    /// Create the service with the default swarm engine for this build.
    ///
    /// With the `torrent` feature this starts a librqbit session; otherwise
    /// magnet jobs fail with "Torrent downloads are not available".
    pub async fn new(config: Config) -> Result<Self> {
        #[cfg(feature = "torrent")]
        let engine: Arc<dyn SwarmEngine> = Arc::new(
            crate::swarm::RqbitEngine::new(config.storage.swarm_work_dir.clone()).await?,
        );
        #[cfg(not(feature = "torrent"))]
        let engine: Arc<dyn SwarmEngine> = Arc::new(crate::swarm::NoSwarmEngine);

        Self::with_engine(config, engine).await
    }

    /// Create the service driving `engine` for magnet jobs
    pub async fn with_engine(config: Config, engine: Arc<dyn SwarmEngine>) -> Result<Self> {
        config.validate()?;

        create_dir(&config.storage.publish_dir, "publish").await?;
        create_dir(&config.storage.swarm_work_dir, "swarm work").await?;

        let ids = IdAllocator::open(
            &config.storage.id_log_path,
            config.ids.length,
            config.ids.max_retries,
        )
        .await?;

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("filedrop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;

        let url_fetch = UrlFetch::new(
            client,
            config.jobs.progress_interval(),
            config.jobs.request_timeout,
        );
        let engine_name = engine.name();
        let swarm_fetch = SwarmFetch::new(
            engine,
            SwarmLimits {
                progress_interval: config.jobs.progress_interval(),
                metadata_timeout: config.jobs.metadata_timeout,
                stall_timeout: config.jobs.stall_timeout,
            },
        );
        let job_slots = config
            .jobs
            .max_concurrent_jobs
            .map(|limit| Arc::new(Semaphore::new(limit)));

        info!(
            publish_dir = %config.storage.publish_dir.display(),
            issued_ids = ids.len().await,
            swarm_engine = engine_name,
            max_concurrent_jobs = ?config.jobs.max_concurrent_jobs,
            "file host ready"
        );

        Ok(Self {
            config: Arc::new(config),
            ids,
            url_fetch,
            swarm_fetch,
            engine_name,
            job_slots,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identifier allocator
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Name of the installed swarm engine
    pub fn swarm_engine(&self) -> &'static str {
        self.engine_name
    }

    /// Public link for a stored file, as seen through `public_host`
    pub fn public_url(&self, public_host: &str, file_name: &str) -> String {
        public_url(self.config.server.public_scheme(), public_host, file_name)
    }

    /// Store an uploaded body under a fresh identifier.
    ///
    /// The extension comes from `original_name`. A body that fails mid-stream
    /// leaves its partial file in place.
    pub async fn save_upload<S, B, E>(
        &self,
        original_name: Option<&str>,
        mut body: S,
    ) -> Result<StoredUpload>
    where
        S: Stream<Item = std::result::Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let id = self.ids.allocate().await?;
        let extension = original_name.and_then(extension_from_name);
        let file_name = id.file_name(extension.as_deref());
        let dest = self.config.storage.publish_dir.join(&file_name);

        let mut file = tokio::fs::File::create(&dest).await?;
        let mut size = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::transfer_failed(std::io::Error::other(e)))?;
            file.write_all(chunk.as_ref()).await?;
            size += chunk.as_ref().len() as u64;
        }
        file.flush().await?;

        info!(id = %id, file = %file_name, size, "upload stored");
        Ok(StoredUpload {
            id,
            file_name,
            size,
        })
    }

    /// Run one fetch job to completion and produce its terminal message.
    ///
    /// Progress samples go to `outbound` while the job runs. Every error is
    /// turned into a failure message for `request.id`; nothing here fails the
    /// caller's session.
    pub async fn run_job(
        &self,
        request: &FetchRequest,
        public_host: &str,
        outbound: &Outbound,
    ) -> JobMessage {
        match self.fetch(request.id, &request.url, outbound).await {
            Ok(published) => {
                let url = self.public_url(public_host, &published.file_name);
                info!(tag = request.id, url = %url, size = published.size, "job published");
                published.into_message(request.id, url)
            }
            Err(e) => {
                warn!(tag = request.id, source = %request.url, error = %e, "job failed");
                JobMessage::Failed(JobFailure::from_error(request.id, &e))
            }
        }
    }

    async fn fetch(
        &self,
        tag: CorrelationTag,
        raw_source: &str,
        outbound: &Outbound,
    ) -> Result<Published> {
        let source = Source::parse(raw_source)?;

        let _slot = match &self.job_slots {
            Some(slots) => {
                debug!(tag, available = slots.available_permits(), "waiting for job slot");
                Some(
                    Arc::clone(slots)
                        .acquire_owned()
                        .await
                        .map_err(|_| Error::ApiServerError("job slots closed".into()))?,
                )
            }
            None => None,
        };

        let id = self.ids.allocate().await?;
        let storage = &self.config.storage;

        match source {
            Source::Url(url) => {
                let extension = extension_from_url(&url);
                let dest = storage.publish_dir.join(id.file_name(extension.as_deref()));
                self.url_fetch.run(tag, &url, &dest, outbound).await
            }
            Source::Magnet(magnet) => {
                let work_dir = storage.swarm_work_dir.join(id.as_str());
                self.swarm_fetch
                    .run(
                        tag,
                        &magnet,
                        &id,
                        &work_dir,
                        &storage.publish_dir,
                        outbound,
                    )
                    .await
            }
        }
    }
}

async fn create_dir(path: &Path, what: &str) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to create {} directory '{}': {}",
                what,
                path.display(),
                e
            ),
        ))
    })
}

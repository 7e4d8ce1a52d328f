//! Configuration types for filedrop

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Storage locations (publish directory, swarm scratch space, identifier log)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory published artifacts are written to and served from (default: "./files")
    #[serde(default = "default_publish_dir")]
    pub publish_dir: PathBuf,

    /// Scratch directory for raw swarm pieces (default: "./torrent_tmp")
    #[serde(default = "default_swarm_work_dir")]
    pub swarm_work_dir: PathBuf,

    /// Append-only log of every identifier ever issued (default: "./ids")
    #[serde(default = "default_id_log_path")]
    pub id_log_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            publish_dir: default_publish_dir(),
            swarm_work_dir: default_swarm_work_dir(),
            id_log_path: default_id_log_path(),
        }
    }
}

/// Identifier allocation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdConfig {
    /// Identifier length in characters (default: 4)
    #[serde(default = "default_id_length")]
    pub length: usize,

    /// Candidates generated before allocation fails with `Exhausted` (default: 5000)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            length: default_id_length(),
            max_retries: default_max_retries(),
        }
    }
}

/// Fetch job behavior (progress cadence, swarm liveness limits, admission control)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Interval between progress samples in milliseconds (default: 1000)
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Maximum wait for swarm metadata to resolve (default: 300 seconds)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub metadata_timeout: Duration,

    /// Maximum time a swarm download may go without progress (default: 600 seconds)
    #[serde(default = "default_stall_timeout", with = "duration_serde")]
    pub stall_timeout: Duration,

    /// Maximum jobs running at once across all connections (None = unbounded)
    #[serde(default)]
    pub max_concurrent_jobs: Option<usize>,

    /// Overall timeout for a single URL fetch (None = no timeout)
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,
}

impl JobConfig {
    /// Interval between progress samples
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            metadata_timeout: default_metadata_timeout(),
            stall_timeout: default_stall_timeout(),
            max_concurrent_jobs: None,
            request_timeout: None,
        }
    }
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Build public URLs with https (default: true)
    ///
    /// TLS itself is terminated in front of the service.
    #[serde(default = "default_true")]
    pub public_https: bool,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum accepted upload body in bytes (default: 4 GiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// URL scheme used when building public links
    pub fn public_scheme(&self) -> &'static str {
        if self.public_https { "https" } else { "http" }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_https: true,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Main configuration for filedrop
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Identifier allocation
    #[serde(default)]
    pub ids: IdConfig,

    /// Fetch job behavior
    #[serde(default)]
    pub jobs: JobConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.ids.length == 0 {
            return Err(Error::Config {
                message: "identifier length must be at least 1".into(),
                key: Some("ids.length".into()),
            });
        }
        if self.ids.max_retries == 0 {
            return Err(Error::Config {
                message: "identifier retries must be at least 1".into(),
                key: Some("ids.max_retries".into()),
            });
        }
        if self.jobs.progress_interval_ms == 0 {
            return Err(Error::Config {
                message: "progress interval must be positive".into(),
                key: Some("jobs.progress_interval_ms".into()),
            });
        }
        if self.jobs.max_concurrent_jobs == Some(0) {
            return Err(Error::Config {
                message: "max_concurrent_jobs must be at least 1 when set".into(),
                key: Some("jobs.max_concurrent_jobs".into()),
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_publish_dir() -> PathBuf {
    PathBuf::from("files")
}

fn default_swarm_work_dir() -> PathBuf {
    PathBuf::from("torrent_tmp")
}

fn default_id_log_path() -> PathBuf {
    PathBuf::from("ids")
}

fn default_id_length() -> usize {
    4
}

fn default_max_retries() -> u32 {
    5000
}

fn default_progress_interval_ms() -> u64 {
    1000
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_stall_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_max_upload_bytes() -> usize {
    usize::try_from(4u64 << 30).unwrap_or(usize::MAX)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

//! Identifier allocation
//!
//! Identifiers are short random tokens drawn from a 62-character alphabet.
//! Every identifier ever issued is kept in an in-memory set and appended to a
//! durable log, so uniqueness survives restarts.

use crate::error::{Error, Result};
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Characters identifiers are drawn from
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Public token naming a stored artifact
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Get the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stored filename for this identifier with an optional extension
    pub fn file_name(&self, extension: Option<&str>) -> String {
        match extension {
            Some(ext) if !ext.is_empty() => format!("{}.{}", self.0, ext),
            _ => self.0.clone(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

struct Registry {
    issued: HashSet<String>,
    log: File,
}

/// Issues collision-free identifiers and records them durably
///
/// The check-insert-append sequence runs under a single lock; nothing else
/// in the service shares it.
pub struct IdAllocator {
    registry: Mutex<Registry>,
    log_path: PathBuf,
    length: usize,
    max_retries: u32,
}

impl IdAllocator {
    /// Open the allocator, rebuilding the issued set from the log at `log_path`.
    ///
    /// A missing log is created empty. A log path that is a directory is an error.
    pub async fn open(log_path: impl AsRef<Path>, length: usize, max_retries: u32) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();

        if let Ok(meta) = tokio::fs::metadata(&log_path).await
            && meta.is_dir()
        {
            return Err(Error::Config {
                message: format!("identifier log {} is a directory", log_path.display()),
                key: Some("storage.id_log_path".into()),
            });
        }

        let issued = match tokio::fs::read_to_string(&log_path).await {
            Ok(contents) => parse_log(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(Error::Io(e)),
        };

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await?;

        info!(
            path = %log_path.display(),
            issued = issued.len(),
            "identifier log loaded"
        );

        Ok(Self {
            registry: Mutex::new(Registry { issued, log }),
            log_path,
            length,
            max_retries,
        })
    }

    /// Issue a fresh identifier.
    ///
    /// Fails with [`Error::Exhausted`] after `max_retries` colliding candidates.
    /// The identifier is on disk before it is returned.
    pub async fn allocate(&self) -> Result<Identifier> {
        let mut registry = self.registry.lock().await;

        let mut found = None;
        for _ in 0..self.max_retries {
            let candidate = generate(self.length);
            if !registry.issued.contains(&candidate) {
                found = Some(candidate);
                break;
            }
        }
        let Some(id) = found else {
            return Err(Error::Exhausted {
                attempts: self.max_retries,
            });
        };

        registry.log.write_all(format!("{id}\n").as_bytes()).await?;
        registry.log.flush().await?;
        registry.log.sync_data().await?;
        registry.issued.insert(id.clone());

        debug!(id = %id, "identifier allocated");
        Ok(Identifier(id))
    }

    /// Whether `id` has ever been issued
    pub async fn contains(&self, id: &str) -> bool {
        self.registry.lock().await.issued.contains(id)
    }

    /// Number of identifiers issued so far, including those loaded from the log
    pub async fn len(&self) -> usize {
        self.registry.lock().await.issued.len()
    }

    /// Whether no identifier has been issued yet
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn parse_log(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn generate(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

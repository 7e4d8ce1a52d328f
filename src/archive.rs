//! Directory archiving
//!
//! Bundles a finished multi-file swarm download into a single tar archive in
//! the publish directory. Only regular files become entries; each entry keeps
//! its path relative to the source root with `/` separators.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::debug;
use tar::Builder;
use walkdir::WalkDir;

/// Fixed extension of published archives
pub const ARCHIVE_EXTENSION: &str = "tar";

/// Summary of a written archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of file entries written
    pub entries: usize,
    /// Total file bytes archived
    pub bytes: u64,
}

/// Archive `source_dir` into a tar file at `dest` without blocking the runtime.
///
/// Any unreadable entry or write failure aborts the whole archive with
/// [`Error::Archive`]; a partially written `dest` is left in place.
pub async fn archive_dir(source_dir: &Path, dest: &Path) -> Result<ArchiveSummary> {
    let source_dir = source_dir.to_path_buf();
    let dest = dest.to_path_buf();
    spawn_blocking(move || archive_dir_blocking(&source_dir, &dest))
        .await
        .map_err(|e| Error::Archive {
            path: PathBuf::new(),
            reason: format!("archive task failed: {e}"),
        })?
}

/// Blocking implementation of [`archive_dir`]
pub fn archive_dir_blocking(source_dir: &Path, dest: &Path) -> Result<ArchiveSummary> {
    debug!(source = %source_dir.display(), dest = %dest.display(), "archiving directory");

    let file = File::create(dest).map_err(|e| archive_error(dest, e))?;
    let mut tar = Builder::new(BufWriter::new(file));
    let mut summary = ArchiveSummary {
        entries: 0,
        bytes: 0,
    };

    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source_dir).to_path_buf();
            archive_error(&path, e)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry_name(source_dir, path)?;
        let len = entry.metadata().map_err(|e| archive_error(path, e))?.len();

        tar.append_path_with_name(path, &name)
            .map_err(|e| archive_error(path, e))?;

        summary.entries += 1;
        summary.bytes += len;
    }

    let mut writer = tar.into_inner().map_err(|e| archive_error(dest, e))?;
    writer.flush().map_err(|e| archive_error(dest, e))?;

    debug!(
        dest = %dest.display(),
        entries = summary.entries,
        bytes = summary.bytes,
        "archive written"
    );
    Ok(summary)
}

/// Stored entry name: path relative to `root`, `/`-separated
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|e| archive_error(path, e))?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Archive {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

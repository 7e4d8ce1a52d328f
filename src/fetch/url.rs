//! Plain HTTP(S) fetch jobs

use crate::error::{Error, Result};
use crate::progress::{FileSizeProbe, Outbound, ProgressReporter, ReportTarget};
use crate::types::{CorrelationTag, Published};
use crate::utils::display_name_from_url;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

/// Validate a URL fetch source: absolute, http or https, with a host
pub fn parse_source_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::invalid_source(raw, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::invalid_source(
                raw,
                format!("unsupported scheme {other:?}"),
            ));
        }
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::invalid_source(raw, "missing host"));
    }
    Ok(url)
}

/// Downloads one URL into the publish directory while reporting progress
pub struct UrlFetch {
    client: reqwest::Client,
    progress_interval: Duration,
    request_timeout: Option<Duration>,
}

impl UrlFetch {
    /// Create a fetcher sharing `client`
    pub fn new(
        client: reqwest::Client,
        progress_interval: Duration,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            progress_interval,
            request_timeout,
        }
    }

    /// Fetch `source` into `dest`, streaming progress samples for `tag` to `outbound`.
    ///
    /// The source must advertise a `Content-Length`. On a failed copy the partial
    /// file is left where it is.
    pub async fn run(
        &self,
        tag: CorrelationTag,
        source: &Url,
        dest: &Path,
        outbound: &Outbound,
    ) -> Result<Published> {
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::transfer_failed(std::io::Error::other("destination has no file name")))?;
        let name = display_name_from_url(source, &file_name);

        let mut request = self.client.get(source.clone());
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let mut response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "timed out".to_string()
            } else if e.is_connect() {
                format!("connection failed: {e}")
            } else {
                e.to_string()
            };
            Error::UnreachableSource(reason)
        })?;

        if !response.status().is_success() {
            return Err(Error::UnreachableSource(format!(
                "HTTP {} from {}",
                response.status(),
                source
            )));
        }

        let total = response
            .content_length()
            .ok_or_else(|| Error::SizeUnknown(source.to_string()))?;

        info!(tag, source = %source, dest = %dest.display(), total, "URL fetch started");

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(Error::transfer_failed)?;

        let mut reporter = ProgressReporter::start(
            ReportTarget {
                tag,
                total,
                name: name.clone(),
            },
            Arc::new(FileSizeProbe::new(dest)),
            outbound.clone(),
            self.progress_interval,
        );

        let copied = copy_body(&mut response, &mut file, total).await;
        drop(file);

        match copied {
            Ok(written) => {
                reporter.finish().await;
                debug!(tag, written, "URL fetch complete");
                Ok(Published {
                    file_name,
                    size: total,
                    name,
                })
            }
            Err(e) => {
                reporter.stop().await;
                warn!(tag, source = %source, error = %e, "URL fetch failed, partial file kept");
                Err(e)
            }
        }
    }
}

async fn copy_body(
    response: &mut reqwest::Response,
    file: &mut tokio::fs::File,
    total: u64,
) -> Result<u64> {
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|e| Error::transfer_failed(std::io::Error::other(e)))? {
        file.write_all(&chunk).await.map_err(Error::transfer_failed)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(Error::transfer_failed)?;

    if written < total {
        return Err(Error::transfer_failed(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("body ended after {written} of {total} bytes"),
        )));
    }
    Ok(written)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

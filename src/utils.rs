//! Utility functions for storage naming and public URLs

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Leading alphanumeric run of an extension ("mp4?x=1" -> "mp4")
static EXTENSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new("^[A-Za-z0-9]+").expect("static regex is valid")
});

/// Infer the stored-file extension from a source URL.
///
/// Only the final path segment is considered; query strings and fragments are
/// ignored and the extension is truncated to its leading alphanumeric run.
///
/// # Examples
///
/// ```
/// use filedrop::utils::extension_from_url;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/media/clip.mp4?token=abc").unwrap();
/// assert_eq!(extension_from_url(&url), Some("mp4".to_string()));
///
/// let url = Url::parse("https://example.com/download").unwrap();
/// assert_eq!(extension_from_url(&url), None);
/// ```
#[must_use]
pub fn extension_from_url(url: &url::Url) -> Option<String> {
    let segment = last_segment(url)?;
    extension_from_name(&segment)
}

/// Extension of a file name, truncated to its leading alphanumeric run
///
/// # Examples
///
/// ```
/// use filedrop::utils::extension_from_name;
///
/// assert_eq!(extension_from_name("report.final.pdf"), Some("pdf".to_string()));
/// assert_eq!(extension_from_name("README"), None);
/// assert_eq!(extension_from_name(".bashrc"), None);
/// ```
#[must_use]
pub fn extension_from_name(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    EXTENSION_RE.find(ext).map(|m| m.as_str().to_string())
}

/// Human-readable name for a URL fetch: the last path segment, percent-decoded.
///
/// Falls back to the host, then to `fallback`.
#[must_use]
pub fn display_name_from_url(url: &url::Url, fallback: &str) -> String {
    if let Some(segment) = last_segment(url) {
        return segment;
    }
    url.host_str()
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Public link for a stored file: `scheme://host/file_name`
///
/// # Examples
///
/// ```
/// use filedrop::utils::public_url;
///
/// assert_eq!(public_url("https", "files.example.com", "aB3x.tar"), "https://files.example.com/aB3x.tar");
/// ```
#[must_use]
pub fn public_url(scheme: &str, host: &str, file_name: &str) -> String {
    format!("{}://{}/{}", scheme, host, file_name)
}

fn last_segment(url: &url::Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(segment)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(decoded)
}

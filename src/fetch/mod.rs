//! Fetch jobs
//!
//! A job turns one source reference into one published file:
//! - [`UrlFetch`]: streams an HTTP(S) resource straight into the publish directory
//! - [`SwarmFetch`]: downloads a magnet through the swarm engine and archives it

pub mod magnet;
pub mod swarm;
pub mod url;

pub use magnet::MagnetLink;
pub use swarm::{SwarmFetch, SwarmLimits};
pub use self::url::{UrlFetch, parse_source_url};

use crate::error::Result;

/// A validated source reference
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Plain HTTP(S) resource
    Url(::url::Url),
    /// Swarm content addressed by a magnet URI
    Magnet(MagnetLink),
}

impl Source {
    /// Classify and validate a raw source reference.
    ///
    /// `magnet:` references (any case) must carry an info hash; everything else
    /// must be an absolute http or https URL with a host.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let is_magnet = trimmed
            .get(..7)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:"));

        if is_magnet {
            MagnetLink::parse(trimmed).map(Source::Magnet)
        } else {
            parse_source_url(trimmed).map(Source::Url)
        }
    }
}

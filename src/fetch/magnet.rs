//! Magnet URI parsing

use crate::error::{Error, Result};
use std::fmt;

const BTIH_PREFIX: &str = "urn:btih:";

/// A validated `magnet:` URI
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagnetLink {
    uri: String,
    info_hash: String,
    display_name: Option<String>,
    trackers: Vec<String>,
}

impl MagnetLink {
    /// Parse a magnet URI.
    ///
    /// Requires the `magnet` scheme and at least one `xt=urn:btih:` parameter
    /// carrying a 40-character hex or 32-character base32 info hash.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let parsed =
            url::Url::parse(raw).map_err(|e| Error::invalid_source(raw, e.to_string()))?;

        if parsed.scheme() != "magnet" {
            return Err(Error::invalid_source(raw, "not a magnet URI"));
        }

        let mut info_hash = None;
        let mut display_name = None;
        let mut trackers = Vec::new();

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "xt" if info_hash.is_none() => {
                    if let Some(hash) = parse_btih(&value) {
                        info_hash = Some(hash);
                    }
                }
                "dn" => display_name = Some(value.into_owned()),
                "tr" => trackers.push(value.into_owned()),
                _ => {}
            }
        }

        let info_hash = info_hash
            .ok_or_else(|| Error::invalid_source(raw, "missing or malformed xt=urn:btih parameter"))?;

        Ok(Self {
            uri: raw.to_string(),
            info_hash,
            display_name,
            trackers,
        })
    }

    /// The original URI
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Info hash as written in the URI, lowercased
    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    /// Display-name hint (`dn` parameter)
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Tracker URLs (`tr` parameters)
    pub fn trackers(&self) -> &[String] {
        &self.trackers
    }
}

impl fmt::Display for MagnetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

fn parse_btih(value: &str) -> Option<String> {
    let prefix = value.get(..BTIH_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BTIH_PREFIX) {
        return None;
    }
    let hash = &value[BTIH_PREFIX.len()..];

    let valid = match hash.len() {
        40 => hash.bytes().all(|b| b.is_ascii_hexdigit()),
        32 => hash
            .bytes()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A'..=b'Z' | b'2'..=b'7')),
        _ => false,
    };
    valid.then(|| hash.to_ascii_lowercase())
}

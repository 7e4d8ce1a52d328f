//! Job channel message types
//!
//! Inbound: `{"id": <int>, "url": <string>}`.
//! Outbound: one JSON object per frame, either a progress sample, a published
//! result or a failure, each carrying the caller's correlation tag.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Caller-chosen integer used to demultiplex concurrent jobs on one connection
pub type CorrelationTag = i64;

/// Job request as sent by the client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Correlation tag echoed back on every message for this job
    #[serde(alias = "ID")]
    pub id: CorrelationTag,
    /// HTTP(S) URL or magnet URI
    #[serde(alias = "URL")]
    pub url: String,
}

impl FetchRequest {
    /// Parse a request frame
    pub fn parse(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }

    /// Whether this request targets the swarm (magnet scheme)
    pub fn is_magnet(&self) -> bool {
        self.url
            .get(..7)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:"))
    }
}

/// Periodic progress report for one job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Correlation tag
    pub id: CorrelationTag,
    /// Percent complete, 0-100
    pub progress: u8,
    /// Expected total size in bytes
    pub size: u64,
    /// Display name
    pub name: String,
}

/// Successful terminal message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedFile {
    /// Correlation tag
    pub id: CorrelationTag,
    /// Public download URL
    pub url: String,
    /// Size in bytes
    pub size: u64,
    /// Display name
    pub name: String,
}

/// Failed terminal message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Correlation tag
    pub id: CorrelationTag,
    /// Generic error text
    pub error: String,
}

impl JobFailure {
    /// Build the failure message for `error`, using its client-safe text
    pub fn from_error(id: CorrelationTag, error: &Error) -> Self {
        Self {
            id,
            error: error.client_message().to_string(),
        }
    }
}

/// Any message the server writes to the job channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobMessage {
    /// Progress sample
    Progress(ProgressSample),
    /// Published result
    Published(PublishedFile),
    /// Failure
    Failed(JobFailure),
}

impl JobMessage {
    /// Correlation tag this message belongs to
    pub fn tag(&self) -> CorrelationTag {
        match self {
            JobMessage::Progress(p) => p.id,
            JobMessage::Published(p) => p.id,
            JobMessage::Failed(f) => f.id,
        }
    }

    /// Whether this is the final message for its job
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobMessage::Progress(_))
    }

    /// Serialize to a single JSON frame
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Outcome of a fetch job before it is tagged for the client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    /// Stored filename in the publish directory
    pub file_name: String,
    /// Size in bytes
    pub size: u64,
    /// Display name
    pub name: String,
}

impl Published {
    /// Attach the public URL and correlation tag
    pub fn into_message(self, id: CorrelationTag, public_url: String) -> JobMessage {
        JobMessage::Published(PublishedFile {
            id,
            url: public_url,
            size: self.size,
            name: self.name,
        })
    }
}

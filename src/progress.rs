//! Progress sampling for running fetch jobs.
//!
//! A [`ProgressReporter`] owns a background task that samples a
//! [`ProgressProbe`] at a fixed cadence and pushes [`ProgressSample`]s onto
//! the connection's [`Outbound`] queue. The job that starts a reporter owns
//! its lifetime: dropping the reporter stops the task.

use crate::types::{CorrelationTag, JobMessage, ProgressSample};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Percent complete as an integer 0-100.
///
/// The denominator is clamped to at least 1; the result never exceeds 100.
pub fn percent(completed: u64, total: u64) -> u8 {
    let total = total.max(1) as u128;
    let pct = (completed as u128 * 100) / total;
    pct.min(100) as u8
}

/// Error returned when the client side of the job channel is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClosed;

/// Sending half of a connection's outbound message queue
///
/// Cloned into every job on the connection. The queue is unbounded so one
/// job's output never waits on another's; a single writer drains it.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<JobMessage>,
}

impl Outbound {
    /// Create a queue, returning the sender and the writer's receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a message for the client
    pub fn send(&self, message: JobMessage) -> Result<(), ChannelClosed> {
        self.tx.send(message).map_err(|_| ChannelClosed)
    }
}

/// Source of "bytes completed so far" for a running job
#[async_trait]
pub trait ProgressProbe: Send + Sync {
    /// Bytes completed so far, or `None` if the value cannot be read right now
    async fn completed_bytes(&self) -> Option<u64>;
}

/// Reads the size of a file being written, without touching the writer
pub struct FileSizeProbe {
    path: PathBuf,
}

impl FileSizeProbe {
    /// Probe the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProgressProbe for FileSizeProbe {
    async fn completed_bytes(&self) -> Option<u64> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Some(meta.len()),
            Err(e) => {
                trace!(path = %self.path.display(), error = %e, "size probe failed");
                None
            }
        }
    }
}

/// Static description of the job being reported on
#[derive(Clone, Debug)]
pub struct ReportTarget {
    /// Correlation tag
    pub tag: CorrelationTag,
    /// Expected total bytes
    pub total: u64,
    /// Display name
    pub name: String,
}

impl ReportTarget {
    fn sample(&self, completed: u64) -> JobMessage {
        self.sample_at(percent(completed, self.total))
    }

    fn sample_at(&self, progress: u8) -> JobMessage {
        JobMessage::Progress(ProgressSample {
            id: self.tag,
            progress,
            size: self.total,
            name: self.name.clone(),
        })
    }
}

/// Handle to a running progress sampler
pub struct ProgressReporter {
    target: ReportTarget,
    outbound: Outbound,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Start sampling. The first sample goes out immediately, then one per `interval`.
    pub fn start(
        target: ReportTarget,
        probe: Arc<dyn ProgressProbe>,
        outbound: Outbound,
        interval: Duration,
    ) -> Self {
        let stop = CancellationToken::new();
        let task = tokio::spawn(sample_loop(
            target.clone(),
            probe,
            outbound.clone(),
            interval,
            stop.clone(),
        ));

        Self {
            target,
            outbound,
            stop,
            task: Some(task),
        }
    }

    /// Stop sampling and wait for the task to exit. Idempotent.
    ///
    /// No sample is emitted once this returns.
    pub async fn stop(&mut self) {
        self.stop.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && e.is_panic()
        {
            debug!(tag = self.target.tag, "progress sampler panicked");
        }
    }

    /// Stop sampling, then emit one final 100% sample for the completed job.
    ///
    /// A completed job is 100% even when its expected total is 0.
    pub async fn finish(mut self) {
        self.stop().await;
        if self.outbound.send(self.target.sample_at(100)).is_err() {
            debug!(tag = self.target.tag, "client gone before final progress sample");
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn sample_loop(
    target: ReportTarget,
    probe: Arc<dyn ProgressProbe>,
    outbound: Outbound,
    interval: Duration,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let completed = probe.completed_bytes().await.unwrap_or(0);
                if stop.is_cancelled() {
                    break;
                }
                if outbound.send(target.sample(completed)).is_err() {
                    debug!(tag = target.tag, "job channel closed, progress reporting stopped");
                    break;
                }
            }
        }
    }
}

//! Per-connection job sessions
//!
//! A [`JobSession`] reads job requests from one client connection, starts a
//! task per request and lets every job write onto the connection's shared
//! [`Outbound`] queue. The session itself never fails because of a job.
//!
//! The session is transport-agnostic: the WebSocket route adapts its frames
//! into [`Frame`]s and drains the outbound queue with its own writer task.

use crate::host::FileHost;
use crate::progress::Outbound;
use crate::types::FetchRequest;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One inbound transport frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Text frame carrying a JSON request
    Text(String),
    /// Binary frame, decoded as UTF-8 JSON
    Binary(Vec<u8>),
    /// Ping, pong and other control traffic
    Control,
    /// The client closed the connection
    Close,
}

/// Why a session stopped reading
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The inbound stream ended or sent a close frame
    ClientClosed,
    /// Reading from the transport failed
    ReadFailed,
    /// The writer side reported the connection closed
    WriterClosed,
}

/// Summary of a finished session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Jobs started on this connection
    pub jobs_started: usize,
    /// Frames skipped because they were not valid requests
    pub frames_skipped: usize,
    /// How the session ended
    pub reason: CloseReason,
}

/// Controller for one client connection
pub struct JobSession {
    host: Arc<FileHost>,
    public_host: String,
}

impl JobSession {
    /// Create a session whose published links use `public_host`
    pub fn new(host: Arc<FileHost>, public_host: impl Into<String>) -> Self {
        Self {
            host,
            public_host: public_host.into(),
        }
    }

    /// Read requests until the client goes away.
    ///
    /// Each valid request runs as its own task and writes exactly one terminal
    /// message to `outbound`. Malformed frames are skipped. The loop also stops
    /// when `closed` is cancelled by the writer. Jobs already started keep
    /// running after this returns.
    pub async fn run<S, E>(
        self,
        mut inbound: S,
        outbound: Outbound,
        closed: CancellationToken,
    ) -> SessionSummary
    where
        S: Stream<Item = std::result::Result<Frame, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut jobs_started = 0;
        let mut frames_skipped = 0;

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = closed.cancelled() => break CloseReason::WriterClosed,
                next = inbound.next() => next,
            };

            let text = match next {
                None | Some(Ok(Frame::Close)) => break CloseReason::ClientClosed,
                Some(Err(e)) => {
                    debug!(error = %e, "job channel read failed");
                    break CloseReason::ReadFailed;
                }
                Some(Ok(Frame::Control)) => continue,
                Some(Ok(Frame::Text(text))) => text,
                Some(Ok(Frame::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "skipping non-UTF-8 job frame");
                        frames_skipped += 1;
                        continue;
                    }
                },
            };

            match FetchRequest::parse(&text) {
                Ok(request) => {
                    self.spawn_job(request, &outbound);
                    jobs_started += 1;
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed job request");
                    frames_skipped += 1;
                }
            }
        };

        info!(jobs_started, frames_skipped, reason = ?reason, "job session closed");
        SessionSummary {
            jobs_started,
            frames_skipped,
            reason,
        }
    }

    fn spawn_job(&self, request: FetchRequest, outbound: &Outbound) {
        debug!(tag = request.id, source = %request.url, magnet = request.is_magnet(), "job accepted");

        let host = Arc::clone(&self.host);
        let public_host = self.public_host.clone();
        let outbound = outbound.clone();
        tokio::spawn(async move {
            let terminal = host.run_job(&request, &public_host, &outbound).await;
            if outbound.send(terminal).is_err() {
                debug!(tag = request.id, "client gone before job result");
            }
        });
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::swarm::NoSwarmEngine;
    use crate::types::JobMessage;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Inbound frames fed from a channel, so tests can keep the session open
    fn channel_frames(
        mut rx: mpsc::UnboundedReceiver<Result<Frame, String>>,
    ) -> impl Stream<Item = Result<Frame, String>> + Unpin {
        futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
    }

    async fn test_host(root: &std::path::Path) -> Arc<FileHost> {
        let mut config = Config::default();
        config.storage.publish_dir = root.join("files");
        config.storage.swarm_work_dir = root.join("torrent_tmp");
        config.storage.id_log_path = root.join("ids");
        config.jobs.progress_interval_ms = 10;
        Arc::new(
            FileHost::with_engine(config, Arc::new(NoSwarmEngine))
                .await
                .unwrap(),
        )
    }

    fn text(frame: &str) -> Result<Frame, String> {
        Ok(Frame::Text(frame.to_string()))
    }

    /// Collect messages until every tag in `tags` has its terminal message
    async fn collect_until_done(
        rx: &mut mpsc::UnboundedReceiver<JobMessage>,
        tags: &[i64],
    ) -> Vec<JobMessage> {
        let mut messages = Vec::new();
        let mut remaining: Vec<i64> = tags.to_vec();
        while !remaining.is_empty() {
            let msg = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if msg.is_terminal() {
                remaining.retain(|t| *t != msg.tag());
            }
            messages.push(msg);
        }
        messages
    }

    #[tokio::test]
    async fn concurrent_jobs_each_get_one_terminal_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.bin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1u8; 500])
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fast.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 200]))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let host = test_host(root.path()).await;
        let (outbound, mut rx) = Outbound::channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let session = tokio::spawn(JobSession::new(host, "files.test").run(
            channel_frames(frames_rx),
            outbound,
            closed.clone(),
        ));

        frames_tx
            .send(text(&format!(r#"{{"id": 1, "url": "{}/slow.bin"}}"#, server.uri())))
            .unwrap();
        frames_tx
            .send(text(&format!(r#"{{"ID": 2, "URL": "{}/fast.bin"}}"#, server.uri())))
            .unwrap();

        let messages = collect_until_done(&mut rx, &[1, 2]).await;

        let mut terminals: HashMap<i64, usize> = HashMap::new();
        let mut finished_order = Vec::new();
        for msg in &messages {
            if msg.is_terminal() {
                *terminals.entry(msg.tag()).or_default() += 1;
                finished_order.push(msg.tag());
            }
        }
        assert_eq!(terminals.get(&1), Some(&1));
        assert_eq!(terminals.get(&2), Some(&1));
        // The fast job is not held up behind the slow one
        assert_eq!(finished_order, vec![2, 1]);

        for msg in &messages {
            if let JobMessage::Published(done) = msg {
                assert!(done.url.starts_with("https://files.test/"));
                assert!(done.url.ends_with(".bin"));
            }
        }

        drop(frames_tx);
        let summary = session.await.unwrap();
        assert_eq!(summary.jobs_started, 2);
        assert_eq!(summary.reason, CloseReason::ClientClosed);
    }

    #[tokio::test]
    async fn malformed_request_does_not_close_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 100])
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let host = test_host(root.path()).await;
        let (outbound, mut rx) = Outbound::channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        let session = tokio::spawn(JobSession::new(host, "h").run(
            channel_frames(frames_rx),
            outbound,
            CancellationToken::new(),
        ));

        frames_tx
            .send(text(&format!(r#"{{"id": 1, "url": "{}/a.bin"}}"#, server.uri())))
            .unwrap();
        frames_tx.send(text("{not json")).unwrap();
        frames_tx.send(Ok(Frame::Binary(vec![0xff, 0xfe]))).unwrap();
        frames_tx.send(Ok(Frame::Control)).unwrap();
        frames_tx
            .send(Ok(Frame::Binary(
                format!(r#"{{"id": 2, "url": "{}/b.bin"}}"#, server.uri()).into_bytes(),
            )))
            .unwrap();

        let messages = collect_until_done(&mut rx, &[1, 2]).await;
        let published = messages
            .iter()
            .filter(|m| matches!(m, JobMessage::Published(_)))
            .count();
        assert_eq!(published, 2);

        frames_tx.send(Ok(Frame::Close)).unwrap();
        let summary = session.await.unwrap();
        assert_eq!(summary.jobs_started, 2);
        assert_eq!(summary.frames_skipped, 2);
        assert_eq!(summary.reason, CloseReason::ClientClosed);
    }

    #[tokio::test]
    async fn bad_source_fails_only_its_own_job() {
        let root = tempfile::tempdir().unwrap();
        let host = test_host(root.path()).await;
        let (outbound, mut rx) = Outbound::channel();
        let frames = futures::stream::iter(vec![
            Ok::<_, Infallible>(Frame::Text(r#"{"id": 9, "url": "nonsense"}"#.into())),
        ]);

        let summary = JobSession::new(host, "h")
            .run(frames, outbound, CancellationToken::new())
            .await;
        assert_eq!(summary.jobs_started, 1);

        let messages = collect_until_done(&mut rx, &[9]).await;
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            JobMessage::Failed(f) => {
                assert_eq!(f.id, 9);
                assert_eq!(f.error, "Bad url");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn jobs_survive_closed_writer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 64])
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let host = test_host(root.path()).await;
        let (outbound, rx) = Outbound::channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let session = tokio::spawn(JobSession::new(Arc::clone(&host), "h").run(
            channel_frames(frames_rx),
            outbound,
            closed.clone(),
        ));
        frames_tx
            .send(text(&format!(r#"{{"id": 1, "url": "{}/keep.bin"}}"#, server.uri())))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Writer goes away mid-job
        drop(rx);
        closed.cancel();
        let summary = session.await.unwrap();
        assert_eq!(summary.reason, CloseReason::WriterClosed);

        // The job still runs to completion on disk
        let publish_dir = root.path().join("files");
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let done = std::fs::read_dir(&publish_dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .any(|e| e.metadata().map(|m| m.len() == 64).unwrap_or(false));
            if done {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "job never finished");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn read_error_closes_session() {
        let root = tempfile::tempdir().unwrap();
        let host = test_host(root.path()).await;
        let (outbound, _rx) = Outbound::channel();
        let frames = futures::stream::iter(vec![Err::<Frame, _>("connection reset")]);

        let summary = JobSession::new(host, "h")
            .run(frames, outbound, CancellationToken::new())
            .await;
        assert_eq!(summary.reason, CloseReason::ReadFailed);
        assert_eq!(summary.jobs_started, 0);
    }
}

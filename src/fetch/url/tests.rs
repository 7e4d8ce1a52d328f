use super::*;
use crate::types::JobMessage;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_LENGTH;
use axum::response::Response;
use axum::routing::get;
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(interval_ms: u64) -> UrlFetch {
    UrlFetch::new(
        reqwest::Client::new(),
        Duration::from_millis(interval_ms),
        Some(Duration::from_secs(10)),
    )
}

/// Serve `router` on an ephemeral port, returning its base URL
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Ten 100-byte chunks, 20ms apart
fn slow_stream() -> Body {
    let stream = futures::stream::iter(0..10).then(|_| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, std::io::Error>(Bytes::from(vec![7u8; 100]))
    });
    Body::from_stream(stream)
}

async fn slow_with_length() -> Response {
    Response::builder()
        .header(CONTENT_LENGTH, "1000")
        .body(slow_stream())
        .unwrap()
}

async fn slow_without_length() -> Response {
    Response::builder().body(slow_stream()).unwrap()
}

fn drain(rx: &mut UnboundedReceiver<JobMessage>) -> Vec<JobMessage> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

fn progress_values(messages: &[JobMessage]) -> Vec<u8> {
    messages
        .iter()
        .map(|m| match m {
            JobMessage::Progress(p) => p.progress,
            other => panic!("fetch jobs only emit progress, got {other:?}"),
        })
        .collect()
}

#[tokio::test]
async fn fetch_with_content_length_publishes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 1000]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("aB3x.mp4");
    let source = parse_source_url(&format!("{}/media/clip.mp4", server.uri())).unwrap();
    let (outbound, mut rx) = Outbound::channel();

    let published = fetcher(1000)
        .run(4, &source, &dest, &outbound)
        .await
        .unwrap();

    assert_eq!(
        published,
        Published {
            file_name: "aB3x.mp4".into(),
            size: 1000,
            name: "clip.mp4".into(),
        }
    );
    assert_eq!(std::fs::read(&dest).unwrap(), vec![1u8; 1000]);

    let messages = drain(&mut rx);
    assert!(!messages.is_empty());
    for msg in &messages {
        match msg {
            JobMessage::Progress(p) => {
                assert_eq!(p.id, 4);
                assert_eq!(p.size, 1000);
                assert_eq!(p.name, "clip.mp4");
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
    assert_eq!(progress_values(&messages).last(), Some(&100));
}

#[tokio::test]
async fn empty_body_finishes_at_full_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty.txt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("Zz09.txt");
    let source = parse_source_url(&format!("{}/empty.txt", server.uri())).unwrap();
    let (outbound, mut rx) = Outbound::channel();

    let published = fetcher(1000)
        .run(6, &source, &dest, &outbound)
        .await
        .unwrap();

    assert_eq!(published.size, 0);
    assert!(std::fs::read(&dest).unwrap().is_empty());
    assert_eq!(progress_values(&drain(&mut rx)).last(), Some(&100));
}

#[tokio::test]
async fn progress_rises_while_bytes_arrive() {
    let base = serve(Router::new().route("/slow.bin", get(slow_with_length))).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("slow.bin");
    let source = parse_source_url(&format!("{base}/slow.bin")).unwrap();
    let (outbound, mut rx) = Outbound::channel();

    let published = fetcher(5).run(1, &source, &dest, &outbound).await.unwrap();
    assert_eq!(published.size, 1000);

    let values = progress_values(&drain(&mut rx));
    assert!(values.len() >= 3, "expected several samples, got {values:?}");
    assert!(values[0] < 100);
    assert!(
        values.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {values:?}"
    );
    assert!(values.iter().any(|&v| v > 0 && v < 100), "no intermediate sample: {values:?}");
    assert_eq!(*values.last().unwrap(), 100);
}

#[tokio::test]
async fn missing_content_length_is_size_unknown() {
    let base = serve(Router::new().route("/stream", get(slow_without_length))).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("stream");
    let source = parse_source_url(&format!("{base}/stream")).unwrap();
    let (outbound, mut rx) = Outbound::channel();

    let result = fetcher(5).run(1, &source, &dest, &outbound).await;

    assert!(matches!(result, Err(Error::SizeUnknown(_))), "got {result:?}");
    assert!(!dest.exists());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn error_status_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = parse_source_url(&format!("{}/gone.txt", server.uri())).unwrap();
    let (outbound, _rx) = Outbound::channel();

    let result = fetcher(5)
        .run(1, &source, &dir.path().join("gone.txt"), &outbound)
        .await;

    assert!(matches!(result, Err(Error::UnreachableSource(_))));
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    // Bind and immediately release a port so nothing is listening on it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let source = parse_source_url(&format!("http://{addr}/file.bin")).unwrap();
    let (outbound, _rx) = Outbound::channel();

    let result = fetcher(5)
        .run(1, &source, &dir.path().join("file.bin"), &outbound)
        .await;

    assert!(matches!(result, Err(Error::UnreachableSource(_))));
}

#[tokio::test]
async fn closed_channel_does_not_fail_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("x.bin");
    let source = parse_source_url(&format!("{}/x.bin", server.uri())).unwrap();
    let (outbound, rx) = Outbound::channel();
    drop(rx);

    let published = fetcher(5).run(1, &source, &dest, &outbound).await.unwrap();
    assert_eq!(published.size, 64);
    assert_eq!(std::fs::metadata(&dest).unwrap().len(), 64);
}

#[test]
fn parse_source_url_accepts_http_and_https() {
    assert!(parse_source_url("http://example.com/a").is_ok());
    assert!(parse_source_url("https://example.com/a?b=c").is_ok());
}

#[test]
fn parse_source_url_rejects_invalid() {
    for raw in [
        "example.com/a",
        "/relative/path",
        "ftp://example.com/a",
        "file:///etc/passwd",
        "not a url",
    ] {
        assert!(
            matches!(parse_source_url(raw), Err(Error::InvalidSource { .. })),
            "{raw} should be rejected"
        );
    }
}

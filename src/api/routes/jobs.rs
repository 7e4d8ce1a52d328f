//! Job channel route handler
//!
//! Upgrades to a WebSocket and runs a [`JobSession`] over it. The socket is
//! split: the session reads, and a writer task owns the write half and drains
//! the connection's outbound queue.

use super::public_host;
use crate::api::state::AppState;
use crate::progress::Outbound;
use crate::session::{Frame, JobSession};
use crate::types::JobMessage;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// GET /fromurl - WebSocket job channel
pub async fn job_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let public_host = public_host(&headers, &state);
    ws.on_upgrade(move |socket| serve_job_channel(socket, state, public_host))
}

async fn serve_job_channel(socket: WebSocket, state: AppState, public_host: String) {
    let (sink, stream) = socket.split();
    let (outbound, rx) = Outbound::channel();
    let closed = CancellationToken::new();

    let writer = tokio::spawn(write_messages(sink, rx, closed.clone()));

    JobSession::new(Arc::clone(&state.host), public_host)
        .run(stream.map(|msg| msg.map(frame_from_message)), outbound, closed.clone())
        .await;

    // Reader is done; stop the writer so in-flight jobs see a closed channel
    closed.cancel();
    if let Err(e) = writer.await {
        debug!(error = %e, "job channel writer task failed");
    }
}

fn frame_from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text),
        Message::Binary(bytes) => Frame::Binary(bytes),
        Message::Ping(_) | Message::Pong(_) => Frame::Control,
        Message::Close(_) => Frame::Close,
    }
}

async fn write_messages(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<JobMessage>,
    closed: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(tag = message.tag(), error = %e, "failed to encode job message");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(frame)).await {
            debug!(error = %e, "job channel write failed, closing session");
            closed.cancel();
            break;
        }
    }

    if let Err(e) = sink.close().await {
        debug!(error = %e, "job channel close failed");
    }
}

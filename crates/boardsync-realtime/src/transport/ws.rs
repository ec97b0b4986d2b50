//! WebSocket client transport against a session relay endpoint.
//!
//! Each session maps to one WebSocket connection at `<base-url>/<session-id>`.
//! Frames travel as JSON text messages. The transport only moves frames;
//! degradation and resume belong to the session lifecycle controller.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use boardsync_core::CollabResult;
use boardsync_core::error::CollabError;
use boardsync_core::types::id::SessionId;

use crate::message::codec;
use crate::message::wire::WireFrame;
use crate::presence::participant::ParticipantState;

use super::{SessionTransport, TransportEvent, TransportLink};

/// WebSocket-backed session transport.
#[derive(Debug, Clone)]
pub struct WsTransport {
    base_url: String,
    buffer_size: usize,
    max_frame_size: usize,
}

impl WsTransport {
    /// Creates a transport that dials `<base_url>/<session-id>`.
    pub fn new(base_url: &str, buffer_size: usize, max_frame_size: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            buffer_size,
            max_frame_size,
        }
    }
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn attach(
        &self,
        session_id: SessionId,
        hello: ParticipantState,
    ) -> CollabResult<TransportLink> {
        let url = format!("{}/{}", self.base_url, session_id);

        let (stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            CollabError::with_source(
                boardsync_core::error::ErrorKind::SessionUnavailable,
                format!("WebSocket connect to {url} failed: {e}"),
                e,
            )
        })?;
        let (mut sink, mut source) = stream.split();

        let hello_text = codec::encode(&WireFrame::Hello { participant: hello })?;
        sink.send(Message::text(hello_text)).await.map_err(|e| {
            CollabError::session_unavailable(format!("handshake send on {url} failed: {e}"))
        })?;

        let (out_tx, mut out_rx) = mpsc::channel::<WireFrame>(self.buffer_size);
        let (in_tx, in_rx) = mpsc::channel(self.buffer_size);
        let cancel = CancellationToken::new();

        // Write pump: outbound frames → socket.
        let write_cancel = cancel.clone();
        let write_in_tx = in_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = write_cancel.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    maybe_frame = out_rx.recv() => {
                        let Some(frame) = maybe_frame else { break };
                        let text = match codec::encode(&frame) {
                            Ok(text) => text,
                            Err(err) => {
                                warn!(%err, "dropping unencodable frame");
                                continue;
                            }
                        };
                        if let Err(err) = sink.send(Message::text(text)).await {
                            let _ = write_in_tx
                                .send(TransportEvent::TransientError(
                                    CollabError::transient_transport(format!(
                                        "WebSocket send failed: {err}"
                                    )),
                                ))
                                .await;
                            break;
                        }
                    }
                }
            }
        });

        // Read pump: socket → inbound events.
        let read_cancel = cancel.clone();
        let max_frame_size = self.max_frame_size;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = read_cancel.cancelled() => break,
                    maybe_message = source.next() => match maybe_message {
                        Some(Ok(Message::Text(text))) => {
                            match codec::decode(text.as_str(), max_frame_size) {
                                Ok(frame) => {
                                    if in_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(err) => {
                                    // Inbound is tolerant: an unknown or
                                    // malformed frame is skipped, not fatal.
                                    debug!(%err, "ignoring undecodable frame");
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = in_tx.send(TransportEvent::Closed).await;
                            break;
                        }
                        Some(Ok(_)) => {} // ping/pong/binary
                        Some(Err(err)) => {
                            let _ = in_tx
                                .send(TransportEvent::TransientError(
                                    CollabError::transient_transport(format!(
                                        "WebSocket read failed: {err}"
                                    )),
                                ))
                                .await;
                            break;
                        }
                    }
                }
            }
        });

        Ok(TransportLink::new(out_tx, in_rx, cancel))
    }
}

//! Transport substrate for session channels.
//!
//! The engine only needs three primitives from a transport: membership
//! notification delivery, a presence record scoped to the channel, and
//! best-effort broadcast. Anything offering those — an in-process hub, a
//! WebSocket relay — satisfies [`SessionTransport`].

pub mod memory;
pub mod ws;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use boardsync_core::config::AppConfig;
use boardsync_core::config::transport::TransportMode;
use boardsync_core::{CollabError, CollabResult};

use crate::message::wire::WireFrame;
use crate::presence::participant::ParticipantState;

/// Events surfaced by an attached link.
#[derive(Debug)]
pub enum TransportEvent {
    /// A frame arrived on the session channel.
    Frame(WireFrame),
    /// The link hit a recoverable error; the lifecycle controller owns the
    /// resume.
    TransientError(CollabError),
    /// The link is gone and will not deliver anything further.
    Closed,
}

/// One participant's live attachment to a session channel.
#[derive(Debug)]
pub struct TransportLink {
    outbound: mpsc::Sender<WireFrame>,
    inbound: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
}

impl TransportLink {
    /// Builds a link from its two pump endpoints and the token that stops
    /// the pumps.
    pub fn new(
        outbound: mpsc::Sender<WireFrame>,
        inbound: mpsc::Receiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            cancel,
        }
    }

    /// Enqueues a frame without waiting. Returns `false` when the frame was
    /// dropped (buffer full or link down) — callers treat that as the
    /// silent-drop policy, not as an error.
    pub fn try_send(&self, frame: WireFrame) -> bool {
        self.outbound.try_send(frame).is_ok()
    }

    /// A clone of the outbound sender, for binding into a broadcaster.
    pub fn sender(&self) -> mpsc::Sender<WireFrame> {
        self.outbound.clone()
    }

    /// Receives the next transport event. `None` means the link's pumps
    /// are gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }

    /// Stops the link's pump tasks.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A pub/sub substrate that can attach a participant to a session channel.
#[async_trait]
pub trait SessionTransport: Send + Sync + std::fmt::Debug {
    /// Attaches to a session channel, announcing `hello` to peers.
    ///
    /// Fails with [`ErrorKind::SessionUnavailable`] when the channel cannot
    /// be reached at all.
    ///
    /// [`ErrorKind::SessionUnavailable`]: boardsync_core::error::ErrorKind::SessionUnavailable
    async fn attach(
        &self,
        session_id: boardsync_core::types::id::SessionId,
        hello: ParticipantState,
    ) -> CollabResult<TransportLink>;
}

/// Builds the transport selected by configuration.
pub fn from_config(config: &AppConfig) -> Arc<dyn SessionTransport> {
    match config.transport.mode {
        TransportMode::Memory => Arc::new(memory::MemoryHub::new(config.collab.channel_buffer_size)),
        TransportMode::Websocket => Arc::new(ws::WsTransport::new(
            &config.transport.ws_url,
            config.collab.channel_buffer_size,
            config.collab.max_frame_size_bytes,
        )),
    }
}

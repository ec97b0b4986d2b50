//! In-process session hub for single-node deployments and tests.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use async_trait::async_trait;

use boardsync_core::CollabResult;
use boardsync_core::error::CollabError;
use boardsync_core::types::id::{ParticipantId, SessionId};

use crate::message::wire::WireFrame;
use crate::presence::participant::ParticipantState;

use super::{SessionTransport, TransportEvent, TransportLink};

/// One session's channel state inside the hub.
#[derive(Debug)]
struct HubSession {
    /// Fan-out channel carrying every frame published to the session.
    frames: broadcast::Sender<WireFrame>,
    /// Channel-scoped presence records, the hub's answer to a
    /// `PresenceRequest`.
    members: Arc<DashMap<ParticipantId, ParticipantState>>,
    /// Per-attachment drop tokens, used to simulate transport failures.
    links: Arc<DashMap<ParticipantId, CancellationToken>>,
}

impl HubSession {
    fn new(buffer_size: usize) -> Self {
        Self {
            frames: broadcast::channel(buffer_size).0,
            members: Arc::new(DashMap::new()),
            links: Arc::new(DashMap::new()),
        }
    }

    fn member_snapshot(&self) -> Vec<ParticipantState> {
        self.members.iter().map(|e| e.value().clone()).collect()
    }
}

/// In-memory pub/sub hub implementing the session transport contract.
///
/// Delivery is best-effort: a slow subscriber that lags the broadcast
/// buffer simply misses frames, which mirrors the semantics of a hosted
/// presence channel.
#[derive(Debug)]
pub struct MemoryHub {
    sessions: Arc<DashMap<SessionId, HubSession>>,
    buffer_size: usize,
}

impl MemoryHub {
    /// Creates a hub with the given per-channel buffer size.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            buffer_size,
        }
    }

    /// Severs one participant's link as if their connection dropped: peers
    /// see a leave, and the victim's link reports a transient error so its
    /// lifecycle controller enters the resume path.
    pub fn drop_link(&self, session_id: SessionId, participant_id: ParticipantId) {
        if let Some(session) = self.sessions.get(&session_id) {
            if let Some((_, token)) = session.links.remove(&participant_id) {
                token.cancel();
            }
            if session.members.remove(&participant_id).is_some() {
                let _ = session.frames.send(WireFrame::Bye { participant_id });
            }
        }
    }

    /// Number of sessions the hub currently carries.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Presence records currently stored for a session.
    pub fn members(&self, session_id: SessionId) -> Vec<ParticipantState> {
        self.sessions
            .get(&session_id)
            .map(|s| s.member_snapshot())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionTransport for MemoryHub {
    async fn attach(
        &self,
        session_id: SessionId,
        hello: ParticipantState,
    ) -> CollabResult<TransportLink> {
        let participant_id = hello.participant_id;

        let (frames_tx, members, links, kick) = {
            let session = self
                .sessions
                .entry(session_id)
                .or_insert_with(|| HubSession::new(self.buffer_size));
            let kick = CancellationToken::new();
            session.links.insert(participant_id, kick.clone());
            (
                session.frames.clone(),
                session.members.clone(),
                session.links.clone(),
                kick,
            )
        };

        // Subscribe before announcing so the attachment cannot miss frames
        // racing in between.
        let frames_rx = frames_tx.subscribe();
        members.insert(participant_id, hello.clone());
        let _ = frames_tx.send(WireFrame::Hello { participant: hello });
        let _ = frames_tx.send(WireFrame::PresenceSync {
            participants: members.iter().map(|e| e.value().clone()).collect(),
        });

        let (out_tx, out_rx) = mpsc::channel(self.buffer_size);
        let (in_tx, in_rx) = mpsc::channel(self.buffer_size);
        let cancel = CancellationToken::new();

        tokio::spawn(run_outbound(
            OutboundPump {
                session_id,
                participant_id,
                frames_tx: frames_tx.clone(),
                members,
                links,
                sessions: self.sessions.clone(),
                in_tx: in_tx.clone(),
            },
            out_rx,
            cancel.clone(),
            kick.clone(),
        ));
        tokio::spawn(run_inbound(
            participant_id,
            frames_rx,
            in_tx,
            cancel.clone(),
            kick,
        ));

        Ok(TransportLink::new(out_tx, in_rx, cancel))
    }
}

/// State shared by one attachment's outbound pump.
struct OutboundPump {
    session_id: SessionId,
    participant_id: ParticipantId,
    frames_tx: broadcast::Sender<WireFrame>,
    members: Arc<DashMap<ParticipantId, ParticipantState>>,
    links: Arc<DashMap<ParticipantId, CancellationToken>>,
    sessions: Arc<DashMap<SessionId, HubSession>>,
    in_tx: mpsc::Sender<TransportEvent>,
}

async fn run_outbound(
    pump: OutboundPump,
    mut out_rx: mpsc::Receiver<WireFrame>,
    cancel: CancellationToken,
    kick: CancellationToken,
) {
    let mut said_bye = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = kick.cancelled() => {
                // drop_link already cleaned up membership.
                said_bye = true;
                break;
            }
            maybe_frame = out_rx.recv() => {
                let Some(frame) = maybe_frame else { break };
                match &frame {
                    WireFrame::Presence { participant } => {
                        pump.members.insert(participant.participant_id, participant.clone());
                        let _ = pump.frames_tx.send(frame);
                    }
                    WireFrame::PresenceRequest { .. } => {
                        // The hub itself services snapshot reads from its
                        // channel-scoped presence records.
                        let participants: Vec<ParticipantState> =
                            pump.members.iter().map(|e| e.value().clone()).collect();
                        let _ = pump
                            .in_tx
                            .send(TransportEvent::Frame(WireFrame::PresenceSync { participants }))
                            .await;
                    }
                    WireFrame::Bye { participant_id } => {
                        pump.members.remove(participant_id);
                        pump.links.remove(participant_id);
                        said_bye = true;
                        let _ = pump.frames_tx.send(frame);
                        break;
                    }
                    _ => {
                        let _ = pump.frames_tx.send(frame);
                    }
                }
            }
        }
    }

    // A link that vanished without saying goodbye still produces a leave
    // notification for its peers, like a hosted channel would.
    if !said_bye {
        pump.links.remove(&pump.participant_id);
        if pump.members.remove(&pump.participant_id).is_some() {
            let _ = pump.frames_tx.send(WireFrame::Bye {
                participant_id: pump.participant_id,
            });
        }
    }

    pump.sessions
        .remove_if(&pump.session_id, |_, session| {
            session.members.is_empty() && session.links.is_empty()
        });
}

async fn run_inbound(
    participant_id: ParticipantId,
    mut frames_rx: broadcast::Receiver<WireFrame>,
    in_tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
    kick: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = kick.cancelled() => {
                let _ = in_tx
                    .send(TransportEvent::TransientError(CollabError::transient_transport(
                        "link dropped by transport",
                    )))
                    .await;
                break;
            }
            result = frames_rx.recv() => match result {
                Ok(frame) => {
                    // The channel echoes every publish; filter our own.
                    if frame.origin() == Some(participant_id) {
                        continue;
                    }
                    if in_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(%participant_id, skipped, "hub subscriber lagged, frames missed");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    let _ = in_tx.send(TransportEvent::Closed).await;
                    break;
                }
            }
        }
    }
}

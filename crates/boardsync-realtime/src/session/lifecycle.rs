//! Session lifecycle controller — one attachment's state machine.
//!
//! `Connecting → Connected → Active ⇄ Degraded → Closed`. The controller
//! owns the transport link, the heartbeat, the cursor throttle, and the
//! liveness sweep for its session. It is single-participant,
//! single-session, and never reused after reaching `Closed`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use boardsync_core::CollabResult;
use boardsync_core::config::collab::CollabConfig;
use boardsync_core::error::CollabError;
use boardsync_core::types::id::{ObjectId, SessionId};

use crate::broadcast::broadcaster::ChangeBroadcaster;
use crate::events::CollabEvent;
use crate::message::wire::WireFrame;
use crate::metrics::EngineMetrics;
use crate::presence::participant::{CursorPosition, ParticipantState, PresencePatch};
use crate::presence::registry::{PresenceRegistry, RemoteDelta};
use crate::throttle::Throttle;
use crate::transport::{SessionTransport, TransportEvent, TransportLink};

use super::heartbeat::Heartbeat;
use super::session::Session;

/// States of one participant's attachment to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Attach requested, transport handshake in flight.
    Connecting,
    /// Transport established, presence not yet published.
    Connected,
    /// Presence published; broadcasts flow both ways.
    Active,
    /// Transient transport failure; resume attempts are running and
    /// outbound broadcasts are dropped.
    Degraded,
    /// Terminal: explicit leave or retry budget exhausted.
    Closed,
}

/// Commands from the handle to the controller's run task.
#[derive(Debug)]
pub(crate) enum Command {
    UpdateCursor(CursorPosition),
    SetActiveObject(Option<ObjectId>),
    RequestPresenceSync,
}

/// Everything the run task needs, bundled once at spawn.
pub(crate) struct ControllerContext {
    pub session_id: SessionId,
    pub local: ParticipantState,
    pub config: CollabConfig,
    pub transport: Arc<dyn SessionTransport>,
    pub registry: Arc<PresenceRegistry>,
    pub broadcaster: Arc<ChangeBroadcaster>,
    pub events: broadcast::Sender<CollabEvent>,
    pub metrics: Arc<EngineMetrics>,
    pub session: Arc<Session>,
}

/// Outcome of one select round.
enum Step {
    Continue,
    Degrade,
    Close,
}

/// Drives one attachment until it reaches `Closed`.
pub(crate) struct LifecycleController {
    ctx: ControllerContext,
    link: Option<TransportLink>,
    commands: mpsc::Receiver<Command>,
    state_tx: watch::Sender<LifecycleState>,
    cancel: CancellationToken,
    throttle: Throttle<CursorPosition>,
}

impl LifecycleController {
    pub(crate) fn new(
        ctx: ControllerContext,
        link: TransportLink,
        commands: mpsc::Receiver<Command>,
        state_tx: watch::Sender<LifecycleState>,
        cancel: CancellationToken,
    ) -> Self {
        let throttle = Throttle::new(Duration::from_millis(ctx.config.cursor_throttle_ms));
        Self {
            ctx,
            link: Some(link),
            commands,
            state_tx,
            cancel,
            throttle,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut heartbeat = Heartbeat::new(&self.ctx.config);
        let liveness_timeout = heartbeat.liveness_timeout();

        loop {
            if self.link.is_none() {
                self.state_tx.send_replace(LifecycleState::Degraded);
                self.ctx.broadcaster.unbind();

                match resume(&self.ctx, &self.cancel).await {
                    Ok(link) => {
                        self.ctx.broadcaster.bind(link.sender());
                        self.link = Some(link);
                        self.state_tx.send_replace(LifecycleState::Active);
                        self.ctx.metrics.reconnected();
                        let _ = self.ctx.events.send(CollabEvent::ConnectionChanged(true));
                        info!(session_id = %self.ctx.session_id, "attachment resumed");
                    }
                    Err(err) => {
                        self.close(Some(err)).await;
                        return;
                    }
                }
            }

            match self.step(&mut heartbeat, liveness_timeout).await {
                Step::Continue => {}
                Step::Degrade => {
                    self.link = None;
                }
                Step::Close => {
                    self.close(None).await;
                    return;
                }
            }
        }
    }

    /// One select round over cancellation, commands, transport events, the
    /// heartbeat, and the cursor flush deadline. The link is present here.
    async fn step(&mut self, heartbeat: &mut Heartbeat, liveness_timeout: Duration) -> Step {
        let Self {
            ctx,
            link,
            commands,
            cancel,
            throttle,
            ..
        } = self;
        let link = link.as_mut().expect("step without a live link");
        let flush_at = throttle.deadline();

        tokio::select! {
            _ = cancel.cancelled() => Step::Close,
            maybe_command = commands.recv() => match maybe_command {
                Some(Command::UpdateCursor(cursor)) => {
                    if let Some(cursor) = throttle.offer(cursor, Instant::now()) {
                        publish_patch(ctx, PresencePatch::cursor(cursor));
                    }
                    Step::Continue
                }
                Some(Command::SetActiveObject(object_id)) => {
                    publish_patch(ctx, PresencePatch::active_object(object_id));
                    Step::Continue
                }
                Some(Command::RequestPresenceSync) => {
                    ctx.broadcaster.publish(WireFrame::PresenceRequest {
                        from: ctx.local.participant_id,
                    });
                    Step::Continue
                }
                // Handle dropped without an explicit leave.
                None => Step::Close,
            },
            maybe_event = link.recv() => match maybe_event {
                Some(TransportEvent::Frame(frame)) => {
                    ctx.metrics.frame_received();
                    handle_frame(ctx, frame);
                    Step::Continue
                }
                Some(TransportEvent::TransientError(err)) => {
                    warn!(session_id = %ctx.session_id, %err, "transport degraded");
                    Step::Degrade
                }
                Some(TransportEvent::Closed) | None => {
                    warn!(session_id = %ctx.session_id, "transport link closed");
                    Step::Degrade
                }
            },
            _ = heartbeat.tick() => {
                ctx.registry.touch(ctx.session_id, ctx.local.participant_id);
                publish_presence(ctx);

                let evicted = ctx.registry.evict_stale(ctx.session_id, liveness_timeout);
                if !evicted.is_empty() {
                    ctx.metrics.evicted(evicted.len() as u64);
                }
                for participant in evicted {
                    debug!(
                        session_id = %ctx.session_id,
                        participant_id = %participant.participant_id,
                        "participant evicted after liveness timeout"
                    );
                    let _ = ctx
                        .events
                        .send(CollabEvent::ParticipantLeft(participant.participant_id));
                }
                Step::Continue
            }
            _ = time::sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                if let Some(cursor) = throttle.flush(Instant::now()) {
                    publish_patch(ctx, PresencePatch::cursor(cursor));
                }
                Step::Continue
            }
        }
    }

    /// Tears the attachment down. Valid from any state; peers observe a
    /// leave and every timer owned by this controller stops here.
    async fn close(&mut self, failure: Option<CollabError>) {
        if let Some(link) = self.link.take() {
            self.ctx.broadcaster.publish(WireFrame::Bye {
                participant_id: self.ctx.local.participant_id,
            });
            // One scheduling round for the pump to forward the goodbye; the
            // transport synthesizes it if this loses the race.
            tokio::task::yield_now().await;
            link.close();
        }

        self.ctx.broadcaster.unbind();
        self.ctx
            .registry
            .leave(self.ctx.session_id, self.ctx.local.participant_id);
        self.ctx.session.detach();
        self.ctx.metrics.attachment_closed();
        self.state_tx.send_replace(LifecycleState::Closed);

        match failure {
            Some(err) => {
                warn!(
                    session_id = %self.ctx.session_id,
                    participant_id = %self.ctx.local.participant_id,
                    %err,
                    "attachment closed after failure"
                );
                let _ = self.ctx.events.send(CollabEvent::ConnectionChanged(false));
            }
            None => {
                info!(
                    session_id = %self.ctx.session_id,
                    participant_id = %self.ctx.local.participant_id,
                    "attachment closed"
                );
            }
        }
    }
}

/// Merges a local patch and publishes the merged record. Silently ignored
/// when the participant is no longer registered — the normal race between
/// a leave and a trailing update.
fn publish_patch(ctx: &ControllerContext, patch: PresencePatch) {
    if let Some(state) =
        ctx.registry
            .update_presence(ctx.session_id, ctx.local.participant_id, &patch)
    {
        ctx.broadcaster.publish(WireFrame::Presence { participant: state });
    }
}

/// Republishes the current local record (heartbeat, sync responses).
fn publish_presence(ctx: &ControllerContext) {
    if let Some(state) = ctx.registry.get(ctx.session_id, ctx.local.participant_id) {
        ctx.broadcaster.publish(WireFrame::Presence { participant: state });
    }
}

/// Applies one inbound frame to the registry and fans out consumer events.
fn handle_frame(ctx: &ControllerContext, frame: WireFrame) {
    let local_id = ctx.local.participant_id;

    match frame {
        WireFrame::Hello { participant } | WireFrame::Presence { participant } => {
            if participant.participant_id == local_id {
                return;
            }
            match ctx.registry.apply_remote(ctx.session_id, participant) {
                RemoteDelta::Joined(state) => {
                    let _ = ctx.events.send(CollabEvent::ParticipantJoined(state));
                }
                RemoteDelta::Updated {
                    state,
                    cursor_moved,
                    edit_started,
                    edit_ended,
                } => {
                    let participant_id = state.participant_id;
                    if let Some(object_id) = edit_ended {
                        let _ = ctx.events.send(CollabEvent::EditEnded {
                            participant_id,
                            object_id,
                        });
                    }
                    if let Some(object_id) = edit_started {
                        let _ = ctx.events.send(CollabEvent::EditStarted {
                            participant_id,
                            object_id,
                        });
                    }
                    if let Some(cursor) = cursor_moved {
                        let _ = ctx.events.send(CollabEvent::CursorMoved {
                            participant_id,
                            cursor,
                        });
                    }
                }
            }
        }
        WireFrame::PresenceSync { participants } => {
            for participant in participants {
                if participant.participant_id != local_id {
                    ctx.registry.apply_remote(ctx.session_id, participant);
                }
            }
            let _ = ctx
                .events
                .send(CollabEvent::PresenceSynced(ctx.registry.snapshot(ctx.session_id)));
        }
        WireFrame::Change { event } => {
            // No-echo: our own events never come back to us.
            if !ctx.broadcaster.accepts(&event) {
                return;
            }
            ctx.registry.touch(ctx.session_id, event.origin);
            let _ = ctx.events.send(CollabEvent::NodeChanged(event));
        }
        WireFrame::PresenceRequest { from } => {
            if from == local_id {
                return;
            }
            // Answer with our own record so the requester can rebuild.
            publish_presence(ctx);
        }
        WireFrame::Bye { participant_id } => {
            if participant_id == local_id {
                return;
            }
            if ctx.registry.leave(ctx.session_id, participant_id).is_some() {
                let _ = ctx.events.send(CollabEvent::ParticipantLeft(participant_id));
            }
        }
    }
}

/// Reattaches with bounded exponential backoff. Every failure kind counts
/// against the attempt budget; only cancellation short-circuits.
async fn resume(ctx: &ControllerContext, cancel: &CancellationToken) -> CollabResult<TransportLink> {
    let policy = &ctx.config.reconnect;
    let attach_timeout = Duration::from_secs(ctx.config.attach_timeout_seconds);

    for attempt in 0..policy.max_attempts {
        let delay = Duration::from_millis(policy.backoff_ms(attempt));
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(CollabError::closed("attachment left while degraded"));
            }
            _ = time::sleep(delay) => {}
        }

        let hello = ctx
            .registry
            .get(ctx.session_id, ctx.local.participant_id)
            .unwrap_or_else(|| ctx.local.clone());

        match time::timeout(attach_timeout, ctx.transport.attach(ctx.session_id, hello)).await {
            Ok(Ok(link)) => return Ok(link),
            Ok(Err(err)) => {
                warn!(
                    session_id = %ctx.session_id,
                    attempt = attempt + 1,
                    %err,
                    "resume attempt failed"
                );
            }
            Err(_) => {
                warn!(
                    session_id = %ctx.session_id,
                    attempt = attempt + 1,
                    "resume attempt timed out"
                );
            }
        }
    }

    Err(CollabError::retry_exhausted(format!(
        "gave up after {} resume attempts",
        policy.max_attempts
    )))
}

//! Consumer-facing handle for one attached participant.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use boardsync_core::types::id::{ObjectId, ParticipantId, SessionId};

use crate::broadcast::broadcaster::ChangeBroadcaster;
use crate::events::CollabEvent;
use crate::message::event::{Change, ChangeEvent};
use crate::presence::participant::{CursorPosition, ParticipantState};
use crate::presence::registry::PresenceRegistry;

use super::lifecycle::{Command, LifecycleState};

/// One participant's live attachment to a session.
///
/// Dropping the handle (or calling [`leave`](SessionHandle::leave))
/// detaches the participant; the handle is not reusable afterwards — a
/// fresh attach goes through [`SessionManager::join`] again.
///
/// [`SessionManager::join`]: super::manager::SessionManager::join
#[derive(Debug)]
pub struct SessionHandle {
    session_id: SessionId,
    participant_id: ParticipantId,
    registry: Arc<PresenceRegistry>,
    broadcaster: Arc<ChangeBroadcaster>,
    events: broadcast::Sender<CollabEvent>,
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<LifecycleState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session_id: SessionId,
        participant_id: ParticipantId,
        registry: Arc<PresenceRegistry>,
        broadcaster: Arc<ChangeBroadcaster>,
        events: broadcast::Sender<CollabEvent>,
        commands: mpsc::Sender<Command>,
        state_rx: watch::Receiver<LifecycleState>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            session_id,
            participant_id,
            registry,
            broadcaster,
            events,
            commands,
            state_rx,
            cancel,
            task: Some(task),
        }
    }

    /// The session this handle is attached to.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// This attachment's participant id.
    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    /// Subscribes to collaboration events. A subscriber added after an
    /// event has fired misses it; use [`snapshot`](Self::snapshot) for
    /// on-demand truth.
    pub fn events(&self) -> broadcast::Receiver<CollabEvent> {
        self.events.subscribe()
    }

    /// Current lifecycle state of this attachment.
    pub fn state(&self) -> LifecycleState {
        *self.state_rx.borrow()
    }

    /// Whether the attachment is currently live.
    pub fn is_connected(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    /// Full participant list as the registry sees it right now.
    pub fn snapshot(&self) -> Vec<ParticipantState> {
        self.registry.snapshot(self.session_id)
    }

    /// Publishes a cursor move. Throttled leading-edge: the first move in
    /// a window goes out immediately, a burst coalesces to its last
    /// position. Fire-and-forget.
    pub fn update_cursor(&self, cursor: CursorPosition) {
        let _ = self.commands.try_send(Command::UpdateCursor(cursor));
    }

    /// Marks the object this participant is editing (`None` ends the
    /// edit). Fire-and-forget.
    pub fn set_active_object(&self, object_id: Option<ObjectId>) {
        let _ = self.commands.try_send(Command::SetActiveObject(object_id));
    }

    /// Asks the channel for a fresh membership snapshot.
    pub fn request_presence_sync(&self) {
        let _ = self.commands.try_send(Command::RequestPresenceSync);
    }

    /// Broadcasts a mutation to all peers, best-effort and without echo to
    /// this participant. Returns the stamped event so callers can apply it
    /// to their own document view.
    pub fn broadcast(&self, change: Change) -> ChangeEvent {
        let event = ChangeEvent::new(self.participant_id, change);
        self.broadcaster.send_change(event.clone());
        event
    }

    /// Detaches from the session. Safe to call from any state — it aborts
    /// an in-flight resume, cancels the heartbeat, and announces the leave
    /// to peers. The handle is consumed.
    pub async fn leave(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // A dropped handle must not leak its controller or timers.
        self.cancel.cancel();
    }
}

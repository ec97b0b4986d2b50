//! Consumer-facing collaboration events.
//!
//! Events are delivered over a per-attachment [`tokio::sync::broadcast`]
//! channel. A subscriber added after an event has fired simply misses it;
//! [`crate::session::handle::SessionHandle::snapshot`] always reflects
//! current truth on demand.

use boardsync_core::types::id::{ObjectId, ParticipantId};

use crate::message::event::ChangeEvent;
use crate::presence::participant::{CursorPosition, ParticipantState};

/// Notifications observed by one attached participant.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// A peer joined the session.
    ParticipantJoined(ParticipantState),
    /// A peer left the session, either explicitly or via liveness eviction.
    ParticipantLeft(ParticipantId),
    /// A peer moved their cursor.
    CursorMoved {
        /// Who moved.
        participant_id: ParticipantId,
        /// New position in document coordinates.
        cursor: CursorPosition,
    },
    /// A peer mutated board objects.
    NodeChanged(ChangeEvent),
    /// A full membership snapshot arrived from the session channel.
    PresenceSynced(Vec<ParticipantState>),
    /// The attachment went live (`true`) or died for good (`false`).
    ///
    /// Transient degradation is not reported here; only terminal outcomes
    /// of the lifecycle state machine are.
    ConnectionChanged(bool),
    /// A peer began editing an object.
    ///
    /// The object id is a weak reference; the object may already be gone.
    EditStarted {
        /// Who is editing.
        participant_id: ParticipantId,
        /// The object being edited.
        object_id: ObjectId,
    },
    /// A peer stopped editing an object.
    EditEnded {
        /// Who stopped.
        participant_id: ParticipantId,
        /// The object that was being edited.
        object_id: ObjectId,
    },
}

//! Session channel frame definitions.

use serde::{Deserialize, Serialize};

use boardsync_core::types::id::ParticipantId;

use crate::presence::participant::ParticipantState;

use super::event::ChangeEvent;

/// Frames exchanged on a session channel.
///
/// Membership notifications, presence records, and change broadcasts all
/// travel as frames; the transport substrate only needs to deliver them
/// best-effort within one session's channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireFrame {
    /// First frame of an attachment; announces the local participant.
    Hello {
        /// The joining participant's full presence record.
        participant: ParticipantState,
    },
    /// Periodic presence publish: heartbeat, cursor, active object.
    ///
    /// Carries the participant's full record; a participant's updates about
    /// themselves are totally ordered by their own send stream, so
    /// receivers overwrite rather than merge.
    Presence {
        /// The publishing participant's current record.
        participant: ParticipantState,
    },
    /// Asks the channel for a fresh membership snapshot.
    PresenceRequest {
        /// Who is asking.
        from: ParticipantId,
    },
    /// Full membership snapshot of the session.
    PresenceSync {
        /// All currently attached participants, in no particular order.
        participants: Vec<ParticipantState>,
    },
    /// A relayed board mutation.
    Change {
        /// The mutation notification.
        event: ChangeEvent,
    },
    /// Clean detach notification.
    Bye {
        /// The departing participant.
        participant_id: ParticipantId,
    },
}

impl WireFrame {
    /// The participant a frame originates from, when it has one.
    /// `PresenceSync` is channel-originated and has no single origin.
    pub fn origin(&self) -> Option<ParticipantId> {
        match self {
            Self::Hello { participant } | Self::Presence { participant } => {
                Some(participant.participant_id)
            }
            Self::PresenceRequest { from } => Some(*from),
            Self::Change { event } => Some(event.origin),
            Self::Bye { participant_id } => Some(*participant_id),
            Self::PresenceSync { .. } => None,
        }
    }
}

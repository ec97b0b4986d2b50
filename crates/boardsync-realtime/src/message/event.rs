//! Board mutation events relayed between participants.
//!
//! A [`ChangeEvent`] is an advisory notification, never authoritative
//! document state. The engine relays events verbatim; merge policy
//! (last-write-wins per field by `emitted_at_ms`) belongs to the consuming
//! document layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use boardsync_core::types::id::{ObjectId, ParticipantId};

/// One relayed mutation notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The participant that produced the change.
    pub origin: ParticipantId,
    /// Client-assigned timestamp in milliseconds, used by consumers as a
    /// last-write-wins tiebreak when reconciling concurrent updates.
    pub emitted_at_ms: i64,
    /// The mutation itself.
    pub change: Change,
}

/// The mutation carried by a [`ChangeEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// A new object appeared on the board.
    Add {
        /// The new object's id.
        target_id: ObjectId,
        /// Full object payload as understood by the document layer.
        object: serde_json::Value,
    },
    /// Fields of existing objects changed.
    Update {
        /// Affected objects.
        target_ids: Vec<ObjectId>,
        /// Changed fields only.
        fields: serde_json::Value,
    },
    /// Objects were removed.
    Delete {
        /// Removed objects.
        target_ids: Vec<ObjectId>,
    },
    /// An object moved to a new position.
    Move {
        /// The moved object.
        target_id: ObjectId,
        /// New x coordinate.
        x: f64,
        /// New y coordinate.
        y: f64,
    },
    /// Several changes coalesced into one message (drag operations and the
    /// like). Semantically equivalent to the sub-changes applied in order.
    Batch {
        /// Sub-changes in application order.
        changes: Vec<Change>,
    },
}

impl Change {
    /// All object ids this change touches, in payload order.
    pub fn target_ids(&self) -> Vec<ObjectId> {
        match self {
            Self::Add { target_id, .. } | Self::Move { target_id, .. } => vec![*target_id],
            Self::Update { target_ids, .. } | Self::Delete { target_ids } => target_ids.clone(),
            Self::Batch { changes } => changes.iter().flat_map(Change::target_ids).collect(),
        }
    }

    /// Whether this is a batch change.
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch { .. })
    }
}

impl ChangeEvent {
    /// Creates an event stamped with the current wall-clock time.
    pub fn new(origin: ParticipantId, change: Change) -> Self {
        Self {
            origin,
            emitted_at_ms: Utc::now().timestamp_millis(),
            change,
        }
    }

    /// Expands a batch into the equivalent sequence of individual events,
    /// preserving origin and timestamp. Non-batch events yield themselves.
    /// Nested batches are expanded depth-first so array order is kept.
    pub fn flatten(&self) -> Vec<ChangeEvent> {
        fn expand(origin: ParticipantId, emitted_at_ms: i64, change: &Change, out: &mut Vec<ChangeEvent>) {
            match change {
                Change::Batch { changes } => {
                    for sub in changes {
                        expand(origin, emitted_at_ms, sub, out);
                    }
                }
                other => out.push(ChangeEvent {
                    origin,
                    emitted_at_ms,
                    change: other.clone(),
                }),
            }
        }

        let mut out = Vec::new();
        expand(self.origin, self.emitted_at_ms, &self.change, &mut out);
        out
    }
}

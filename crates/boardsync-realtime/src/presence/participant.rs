//! Ephemeral per-participant presence state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boardsync_core::types::id::{ObjectId, ParticipantId};

use super::color;

/// Cursor position in document coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    /// Horizontal document coordinate.
    pub x: f64,
    /// Vertical document coordinate.
    pub y: f64,
}

/// One participant's ephemeral state within a session. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantState {
    /// Unique per connection attempt; a reconnecting user gets a fresh id.
    pub participant_id: ParticipantId,
    /// Display name shown to peers.
    pub display_name: String,
    /// Palette color, derived deterministically from the participant id.
    pub color: String,
    /// Current cursor position, absent while not moving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    /// The object this participant is editing, if any.
    ///
    /// A weak reference by id only: the object may be deleted out from
    /// under an in-progress edit, and consumers treat a dangling id as
    /// "no longer editable", not as an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_object_id: Option<ObjectId>,
    /// When this participant was last heard from.
    pub last_seen_at: DateTime<Utc>,
}

impl ParticipantState {
    /// Creates a fresh record with the deterministic palette color.
    pub fn new(participant_id: ParticipantId, display_name: &str) -> Self {
        Self {
            participant_id,
            display_name: display_name.to_string(),
            color: color::assign_color(participant_id).to_string(),
            cursor: None,
            active_object_id: None,
            last_seen_at: Utc::now(),
        }
    }

    /// Whether this participant counts as online: heard from within the
    /// liveness timeout.
    pub fn is_online(&self, liveness_timeout: Duration) -> bool {
        match chrono::Duration::from_std(liveness_timeout) {
            Ok(timeout) => Utc::now() - self.last_seen_at <= timeout,
            Err(_) => true,
        }
    }

    /// Applies a partial update, refreshing `last_seen_at`.
    pub fn apply(&mut self, patch: &PresencePatch) {
        if let Some(cursor) = patch.cursor {
            self.cursor = Some(cursor);
        }
        if let Some(active) = patch.active_object_id {
            self.active_object_id = active;
        }
        self.last_seen_at = Utc::now();
    }
}

/// A partial presence update; only provided fields are merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresencePatch {
    /// New cursor position, if it moved.
    pub cursor: Option<CursorPosition>,
    /// Change to the actively edited object: `Some(Some(id))` begins an
    /// edit, `Some(None)` ends one, `None` leaves it untouched.
    pub active_object_id: Option<Option<ObjectId>>,
}

impl PresencePatch {
    /// A patch that moves the cursor.
    pub fn cursor(cursor: CursorPosition) -> Self {
        Self {
            cursor: Some(cursor),
            ..Self::default()
        }
    }

    /// A patch that begins or ends an edit.
    pub fn active_object(object_id: Option<ObjectId>) -> Self {
        Self {
            active_object_id: Some(object_id),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_has_palette_color() {
        let state = ParticipantState::new(ParticipantId::new(), "Alice");
        assert!(color::PALETTE.contains(&state.color.as_str()));
        assert!(state.cursor.is_none());
        assert!(state.active_object_id.is_none());
    }

    #[test]
    fn test_apply_merges_only_provided_fields() {
        let mut state = ParticipantState::new(ParticipantId::new(), "Alice");
        let object = ObjectId::new();

        state.apply(&PresencePatch::active_object(Some(object)));
        assert_eq!(state.active_object_id, Some(object));

        state.apply(&PresencePatch::cursor(CursorPosition { x: 1.0, y: 2.0 }));
        // Cursor patch leaves the active object untouched.
        assert_eq!(state.active_object_id, Some(object));
        assert_eq!(state.cursor, Some(CursorPosition { x: 1.0, y: 2.0 }));

        state.apply(&PresencePatch::active_object(None));
        assert_eq!(state.active_object_id, None);
    }

    #[test]
    fn test_fresh_state_is_online() {
        let state = ParticipantState::new(ParticipantId::new(), "Alice");
        assert!(state.is_online(Duration::from_secs(60)));
    }
}

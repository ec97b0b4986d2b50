//! Presence registry — the live participant set per session.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use boardsync_core::types::id::{ObjectId, ParticipantId, SessionId};

use super::participant::{CursorPosition, ParticipantState, PresencePatch};

/// A registered participant plus the monotonic receipt time used for
/// liveness (wall clocks are for display, not for eviction decisions).
#[derive(Debug)]
struct Entry {
    state: ParticipantState,
    last_seen: Instant,
}

/// What applying a peer's presence record revealed.
#[derive(Debug, Clone)]
pub enum RemoteDelta {
    /// The peer was not registered before.
    Joined(ParticipantState),
    /// The peer was known; fields may have changed.
    Updated {
        /// Post-merge state.
        state: ParticipantState,
        /// New cursor position, when it moved.
        cursor_moved: Option<CursorPosition>,
        /// Object the peer started editing, if any.
        edit_started: Option<ObjectId>,
        /// Object the peer stopped editing, if any.
        edit_ended: Option<ObjectId>,
    },
}

/// Tracks the live participant set of every session this manager touches.
///
/// The registry never stores document content. Maps are mutated by the
/// lifecycle controller's run task processing inbound frames; consumers
/// only ever receive owned snapshots.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// Session ID → participant ID → entry.
    sessions: DashMap<SessionId, DashMap<ParticipantId, Entry>>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a local participant and returns its initial state.
    pub fn join(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
        display_name: &str,
    ) -> ParticipantState {
        let state = ParticipantState::new(participant_id, display_name);
        self.sessions.entry(session_id).or_default().insert(
            participant_id,
            Entry {
                state: state.clone(),
                last_seen: Instant::now(),
            },
        );
        state
    }

    /// Applies a peer's published presence record, overwriting any previous
    /// one (a participant's updates about themselves are totally ordered by
    /// their own send stream, so overwrite is the correct merge).
    pub fn apply_remote(&self, session_id: SessionId, incoming: ParticipantState) -> RemoteDelta {
        let participants = self.sessions.entry(session_id).or_default();
        let now = Instant::now();

        match participants.get_mut(&incoming.participant_id) {
            None => {
                participants.insert(
                    incoming.participant_id,
                    Entry {
                        state: incoming.clone(),
                        last_seen: now,
                    },
                );
                RemoteDelta::Joined(incoming)
            }
            Some(mut entry) => {
                let previous = entry.state.clone();
                entry.state = incoming.clone();
                entry.last_seen = now;

                let cursor_moved = match (previous.cursor, incoming.cursor) {
                    (old, Some(new)) if old != Some(new) => Some(new),
                    _ => None,
                };
                let edit_started = match (previous.active_object_id, incoming.active_object_id) {
                    (old, Some(new)) if old != Some(new) => Some(new),
                    _ => None,
                };
                let edit_ended = match (previous.active_object_id, incoming.active_object_id) {
                    (Some(old), new) if new != Some(old) => Some(old),
                    _ => None,
                };

                RemoteDelta::Updated {
                    state: incoming,
                    cursor_moved,
                    edit_started,
                    edit_ended,
                }
            }
        }
    }

    /// Merges a partial update into an existing participant and returns the
    /// merged state. Silently a no-op when the participant is not
    /// registered — that is the normal race between a leave and a trailing
    /// update, not an error.
    pub fn update_presence(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
        patch: &PresencePatch,
    ) -> Option<ParticipantState> {
        let participants = self.sessions.get(&session_id)?;
        let mut entry = participants.get_mut(&participant_id)?;
        entry.state.apply(patch);
        entry.last_seen = Instant::now();
        Some(entry.state.clone())
    }

    /// Removes a participant immediately. Idempotent: removing an absent
    /// participant returns `None` and is not an error.
    pub fn leave(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Option<ParticipantState> {
        let participants = self.sessions.get(&session_id)?;
        participants.remove(&participant_id).map(|(_, e)| e.state)
    }

    /// Full participant list for a session, consistent with the registry's
    /// state at the moment of the call. Order is unspecified.
    pub fn snapshot(&self, session_id: SessionId) -> Vec<ParticipantState> {
        self.sessions
            .get(&session_id)
            .map(|participants| participants.iter().map(|e| e.value().state.clone()).collect())
            .unwrap_or_default()
    }

    /// Refreshes a participant's liveness clock.
    pub fn touch(&self, session_id: SessionId, participant_id: ParticipantId) {
        if let Some(participants) = self.sessions.get(&session_id) {
            if let Some(mut entry) = participants.get_mut(&participant_id) {
                entry.last_seen = Instant::now();
                entry.state.last_seen_at = chrono::Utc::now();
            }
        }
    }

    /// Evicts every participant not heard from within the timeout and
    /// returns them. Callers fire exactly one leave notification per
    /// returned participant.
    pub fn evict_stale(&self, session_id: SessionId, timeout: Duration) -> Vec<ParticipantState> {
        let Some(participants) = self.sessions.get(&session_id) else {
            return Vec::new();
        };

        let stale: Vec<ParticipantId> = participants
            .iter()
            .filter(|e| e.value().last_seen.elapsed() > timeout)
            .map(|e| *e.key())
            .collect();

        let mut evicted = Vec::new();
        for participant_id in stale {
            if let Some((_, entry)) = participants.remove(&participant_id) {
                evicted.push(entry.state);
            }
        }
        evicted
    }

    /// Current state of one participant, if registered.
    pub fn get(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Option<ParticipantState> {
        let participants = self.sessions.get(&session_id)?;
        participants.get(&participant_id).map(|e| e.state.clone())
    }

    /// Whether a participant is currently registered.
    pub fn is_registered(&self, session_id: SessionId, participant_id: ParticipantId) -> bool {
        self.sessions
            .get(&session_id)
            .is_some_and(|participants| participants.contains_key(&participant_id))
    }

    /// Number of participants currently registered in a session.
    pub fn participant_count(&self, session_id: SessionId) -> usize {
        self.sessions
            .get(&session_id)
            .map(|participants| participants.len())
            .unwrap_or(0)
    }

    /// Drops all state for a session. Called by the session sweep once the
    /// grace period after the last detach has elapsed.
    pub fn remove_session(&self, session_id: SessionId) {
        self.sessions.remove(&session_id);
    }

    /// Number of sessions with registry state.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (SessionId, ParticipantId) {
        (SessionId::new(), ParticipantId::new())
    }

    #[tokio::test]
    async fn test_join_then_snapshot_contains_participant() {
        let registry = PresenceRegistry::new();
        let (session, alice) = ids();

        let state = registry.join(session, alice, "Alice");
        assert_eq!(state.display_name, "Alice");

        let snapshot = registry.snapshot(session);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].participant_id, alice);
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let registry = PresenceRegistry::new();
        let (session, alice) = ids();

        registry.join(session, alice, "Alice");
        assert!(registry.leave(session, alice).is_some());
        assert!(registry.leave(session, alice).is_none());
        assert!(registry.snapshot(session).is_empty());
    }

    #[tokio::test]
    async fn test_update_unregistered_is_silent_noop() {
        let registry = PresenceRegistry::new();
        let (session, ghost) = ids();

        let patch = PresencePatch::cursor(CursorPosition { x: 1.0, y: 1.0 });
        assert!(registry.update_presence(session, ghost, &patch).is_none());
        assert!(registry.snapshot(session).is_empty());
    }

    #[tokio::test]
    async fn test_two_participants_distinct_entries() {
        let registry = PresenceRegistry::new();
        let session = SessionId::new();
        let alice = ParticipantId::new();
        let bob = ParticipantId::new();

        registry.join(session, alice, "Alice");
        registry.join(session, bob, "Bob");

        let snapshot = registry.snapshot(session);
        assert_eq!(snapshot.len(), 2);
        let names: Vec<_> = snapshot.iter().map(|p| p.display_name.as_str()).collect();
        assert!(names.contains(&"Alice") && names.contains(&"Bob"));
    }

    #[tokio::test]
    async fn test_apply_remote_reports_join_then_cursor_move() {
        let registry = PresenceRegistry::new();
        let (session, peer) = ids();

        let mut state = ParticipantState::new(peer, "Peer");
        match registry.apply_remote(session, state.clone()) {
            RemoteDelta::Joined(joined) => assert_eq!(joined.participant_id, peer),
            other => panic!("expected join, got {other:?}"),
        }

        state.cursor = Some(CursorPosition { x: 10.0, y: 20.0 });
        match registry.apply_remote(session, state) {
            RemoteDelta::Updated { cursor_moved, .. } => {
                assert_eq!(cursor_moved, Some(CursorPosition { x: 10.0, y: 20.0 }));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_remote_reports_edit_transitions() {
        let registry = PresenceRegistry::new();
        let (session, peer) = ids();
        let object = ObjectId::new();

        let mut state = ParticipantState::new(peer, "Peer");
        registry.apply_remote(session, state.clone());

        state.active_object_id = Some(object);
        match registry.apply_remote(session, state.clone()) {
            RemoteDelta::Updated {
                edit_started,
                edit_ended,
                ..
            } => {
                assert_eq!(edit_started, Some(object));
                assert_eq!(edit_ended, None);
            }
            other => panic!("expected update, got {other:?}"),
        }

        state.active_object_id = None;
        match registry.apply_remote(session, state) {
            RemoteDelta::Updated {
                edit_started,
                edit_ended,
                ..
            } => {
                assert_eq!(edit_started, None);
                assert_eq!(edit_ended, Some(object));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_stale_removes_silent_participants() {
        let registry = PresenceRegistry::new();
        let session = SessionId::new();
        let quiet = ParticipantId::new();
        let chatty = ParticipantId::new();

        registry.join(session, quiet, "Quiet");
        registry.join(session, chatty, "Chatty");

        tokio::time::advance(Duration::from_secs(45)).await;
        registry.touch(session, chatty);
        tokio::time::advance(Duration::from_secs(30)).await;

        let evicted = registry.evict_stale(session, Duration::from_secs(60));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].participant_id, quiet);

        // Second sweep finds nothing: eviction fires once per participant.
        assert!(registry.evict_stale(session, Duration::from_secs(60)).is_empty());
        assert_eq!(registry.participant_count(session), 1);
    }
}

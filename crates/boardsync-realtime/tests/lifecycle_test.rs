//! Integration tests for the attach/degrade/resume/close state machine.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use boardsync_core::CollabResult;
use boardsync_core::error::{CollabError, ErrorKind};
use boardsync_core::types::id::SessionId;
use boardsync_realtime::presence::participant::ParticipantState;
use boardsync_realtime::transport::{SessionTransport, TransportLink};
use boardsync_realtime::{CollabEvent, LifecycleState, MemoryHub, SessionManager};

const LONG: Duration = Duration::from_secs(600);
const WAIT: Duration = Duration::from_secs(5);

/// A hub behind an on/off switch, for simulating relay outages.
#[derive(Debug)]
struct GatedTransport {
    hub: MemoryHub,
    online: AtomicBool,
}

impl GatedTransport {
    fn new() -> Self {
        Self {
            hub: MemoryHub::new(64),
            online: AtomicBool::new(true),
        }
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionTransport for GatedTransport {
    async fn attach(
        &self,
        session_id: SessionId,
        hello: ParticipantState,
    ) -> CollabResult<TransportLink> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(CollabError::session_unavailable("relay offline"));
        }
        self.hub.attach(session_id, hello).await
    }
}

#[tokio::test]
async fn test_join_fails_when_transport_unreachable() {
    support::init_tracing();
    let transport = Arc::new(GatedTransport::new());
    transport.set_online(false);
    let manager = SessionManager::new(support::test_config(), transport);

    let err = manager.join(SessionId::new(), "Alice").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionUnavailable);
}

#[tokio::test(start_paused = true)]
async fn test_degraded_attachment_resumes_and_republishes_presence() {
    support::init_tracing();
    let hub = Arc::new(MemoryHub::new(64));
    let manager_a = SessionManager::new(support::test_config(), hub.clone());
    let manager_b = SessionManager::new(support::test_config(), hub.clone());
    let board = SessionId::new();

    let alice = manager_a.join(board, "Alice").await.unwrap();
    let bob = manager_b.join(board, "Bob").await.unwrap();
    let mut alice_events = alice.events();
    let mut bob_events = bob.events();

    hub.drop_link(board, alice.participant_id());

    // The controller resumes on its own after the backoff delay.
    support::wait_for_event(&mut alice_events, LONG, |e| {
        matches!(e, CollabEvent::ConnectionChanged(true))
    })
    .await;
    assert!(alice.is_connected());

    // Bob observes a fresh membership sync that includes Alice again.
    let alice_id = alice.participant_id();
    support::wait_for_event(&mut bob_events, LONG, |e| match e {
        CollabEvent::PresenceSynced(roster) => {
            roster.iter().any(|p| p.participant_id == alice_id)
        }
        _ => false,
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhaustion_closes_attachment() {
    support::init_tracing();
    let transport = Arc::new(GatedTransport::new());
    let manager = SessionManager::new(support::test_config(), transport.clone());
    let board = SessionId::new();

    let alice = manager.join(board, "Alice").await.unwrap();
    let mut events = alice.events();

    // The relay goes away for good.
    transport.set_online(false);
    transport.hub.drop_link(board, alice.participant_id());

    // Exactly one terminal notification after the budget is spent; no
    // further automatic recovery.
    support::wait_for_event(&mut events, LONG, |e| {
        matches!(e, CollabEvent::ConnectionChanged(false))
    })
    .await;
    assert_eq!(alice.state(), LifecycleState::Closed);
    assert!(manager.snapshot(board).is_empty());

    let resumed = support::saw_event(&mut events, Duration::from_secs(120), |e| {
        matches!(e, CollabEvent::ConnectionChanged(true))
    })
    .await;
    assert!(!resumed);
}

#[tokio::test]
async fn test_dropped_handle_detaches_participant() {
    support::init_tracing();
    let hub = Arc::new(MemoryHub::new(64));
    let manager_a = SessionManager::new(support::test_config(), hub.clone());
    let manager_b = SessionManager::new(support::test_config(), hub.clone());
    let board = SessionId::new();

    let alice = manager_a.join(board, "Alice").await.unwrap();
    let bob = manager_b.join(board, "Bob").await.unwrap();
    let mut bob_events = bob.events();

    let alice_id = alice.participant_id();
    drop(alice);

    support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::ParticipantLeft(id) if *id == alice_id)
    })
    .await;
    assert!(bob.snapshot().iter().all(|p| p.participant_id != alice_id));
}

#[tokio::test]
async fn test_shutdown_closes_attachments_and_rejects_joins() {
    support::init_tracing();
    let hub = Arc::new(MemoryHub::new(64));
    let manager_a = SessionManager::new(support::test_config(), hub.clone());
    let manager_b = SessionManager::new(support::test_config(), hub.clone());
    let board = SessionId::new();

    let alice = manager_a.join(board, "Alice").await.unwrap();
    let bob = manager_b.join(board, "Bob").await.unwrap();
    let mut bob_events = bob.events();

    let alice_id = alice.participant_id();
    manager_a.shutdown();

    support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::ParticipantLeft(id) if *id == alice_id)
    })
    .await;

    let err = manager_a.join(board, "Alice again").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Closed);
}

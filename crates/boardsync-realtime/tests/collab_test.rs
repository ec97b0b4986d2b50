//! Integration tests for the join/presence/broadcast flow between two
//! clients sharing one session hub.

mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use boardsync_core::types::id::{ObjectId, SessionId};
use boardsync_realtime::presence::color::PALETTE;
use boardsync_realtime::presence::participant::CursorPosition;
use boardsync_realtime::{Change, CollabEvent, MemoryHub, SessionManager};

const WAIT: Duration = Duration::from_secs(5);

fn two_clients(hub: &Arc<MemoryHub>) -> (SessionManager, SessionManager) {
    (
        SessionManager::new(support::test_config(), hub.clone()),
        SessionManager::new(support::test_config(), hub.clone()),
    )
}

#[tokio::test]
async fn test_join_presence_cursor_leave_scenario() {
    support::init_tracing();
    let hub = Arc::new(MemoryHub::new(64));
    let (manager_a, manager_b) = two_clients(&hub);
    let board = SessionId::new();

    let alice = manager_a.join(board, "Alice").await.unwrap();
    let snapshot = alice.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].display_name, "Alice");
    assert!(PALETTE.contains(&snapshot[0].color.as_str()));

    let mut alice_events = alice.events();

    let bob = manager_b.join(board, "Bob").await.unwrap();
    let mut bob_events = bob.events();

    support::wait_for_event(&mut alice_events, WAIT, |e| {
        matches!(e, CollabEvent::ParticipantJoined(p) if p.display_name == "Bob")
    })
    .await;

    // Bob materializes "who's already here" from the snapshot without
    // waiting for individual join events.
    bob.request_presence_sync();
    support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::PresenceSynced(roster) if roster.len() == 2)
    })
    .await;
    let roster = bob.snapshot();
    assert_eq!(roster.len(), 2);
    for participant in &roster {
        assert!(PALETTE.contains(&participant.color.as_str()));
    }

    // Alice moves her cursor; Bob observes it.
    alice.update_cursor(CursorPosition { x: 10.0, y: 20.0 });
    let event = support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::CursorMoved { .. })
    })
    .await;
    match event {
        CollabEvent::CursorMoved {
            participant_id,
            cursor,
        } => {
            assert_eq!(participant_id, alice.participant_id());
            assert_eq!(cursor, CursorPosition { x: 10.0, y: 20.0 });
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Alice leaves; Bob observes it and the roster shrinks.
    let alice_id = alice.participant_id();
    alice.leave().await;
    support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::ParticipantLeft(id) if *id == alice_id)
    })
    .await;
    assert!(bob.snapshot().iter().all(|p| p.participant_id != alice_id));
}

#[tokio::test]
async fn test_broadcast_reaches_peers_but_never_echoes() {
    support::init_tracing();
    let hub = Arc::new(MemoryHub::new(64));
    let (manager_a, manager_b) = two_clients(&hub);
    let board = SessionId::new();

    let alice = manager_a.join(board, "Alice").await.unwrap();
    let bob = manager_b.join(board, "Bob").await.unwrap();
    let mut alice_events = alice.events();
    let mut bob_events = bob.events();

    let sent = alice.broadcast(Change::Move {
        target_id: ObjectId::new(),
        x: 4.0,
        y: 2.0,
    });

    let event = support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::NodeChanged(_))
    })
    .await;
    match event {
        CollabEvent::NodeChanged(got) => assert_eq!(got, sent),
        other => panic!("unexpected event: {other:?}"),
    }

    // The sender never sees their own event come back.
    let echoed = support::saw_event(&mut alice_events, Duration::from_millis(200), |e| {
        matches!(e, CollabEvent::NodeChanged(_))
    })
    .await;
    assert!(!echoed);
}

/// Toy document reducer used to check batch semantics end to end.
fn apply(doc: &mut HashMap<ObjectId, (f64, f64)>, change: &Change) {
    match change {
        Change::Add { target_id, .. } => {
            doc.insert(*target_id, (0.0, 0.0));
        }
        Change::Move { target_id, x, y } => {
            doc.insert(*target_id, (*x, *y));
        }
        Change::Delete { target_ids } => {
            for id in target_ids {
                doc.remove(id);
            }
        }
        Change::Update { .. } => {}
        Change::Batch { changes } => {
            for sub in changes {
                apply(doc, sub);
            }
        }
    }
}

#[tokio::test]
async fn test_batch_event_equivalent_to_individual_events() {
    support::init_tracing();
    let hub = Arc::new(MemoryHub::new(64));
    let (manager_a, manager_b) = two_clients(&hub);
    let board = SessionId::new();

    let alice = manager_a.join(board, "Alice").await.unwrap();
    let bob = manager_b.join(board, "Bob").await.unwrap();
    let mut bob_events = bob.events();

    let a = ObjectId::new();
    let b = ObjectId::new();
    alice.broadcast(Change::Batch {
        changes: vec![
            Change::Add {
                target_id: a,
                object: serde_json::json!({"kind": "note"}),
            },
            Change::Move {
                target_id: a,
                x: 7.0,
                y: 7.0,
            },
            Change::Add {
                target_id: b,
                object: serde_json::json!({"kind": "note"}),
            },
            Change::Delete {
                target_ids: vec![b],
            },
        ],
    });

    let event = support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::NodeChanged(_))
    })
    .await;
    let CollabEvent::NodeChanged(received) = event else {
        panic!("expected node change");
    };

    let mut doc_batch = HashMap::new();
    apply(&mut doc_batch, &received.change);

    let mut doc_individual = HashMap::new();
    for sub in received.flatten() {
        apply(&mut doc_individual, &sub.change);
    }

    assert_eq!(doc_batch, doc_individual);
    assert_eq!(doc_batch.get(&a), Some(&(7.0, 7.0)));
    assert!(!doc_batch.contains_key(&b));
}

#[tokio::test]
async fn test_edit_start_and_end_observed_by_peers() {
    support::init_tracing();
    let hub = Arc::new(MemoryHub::new(64));
    let (manager_a, manager_b) = two_clients(&hub);
    let board = SessionId::new();

    let alice = manager_a.join(board, "Alice").await.unwrap();
    let bob = manager_b.join(board, "Bob").await.unwrap();
    let mut bob_events = bob.events();

    let object = ObjectId::new();
    alice.set_active_object(Some(object));

    let event = support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::EditStarted { .. })
    })
    .await;
    match event {
        CollabEvent::EditStarted {
            participant_id,
            object_id,
        } => {
            assert_eq!(participant_id, alice.participant_id());
            assert_eq!(object_id, object);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    alice.set_active_object(None);
    let event = support::wait_for_event(&mut bob_events, WAIT, |e| {
        matches!(e, CollabEvent::EditEnded { .. })
    })
    .await;
    match event {
        CollabEvent::EditEnded { object_id, .. } => assert_eq!(object_id, object),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cursor_burst_coalesces_to_trailing_update() {
    support::init_tracing();
    let hub = Arc::new(MemoryHub::new(64));
    let (manager_a, manager_b) = two_clients(&hub);
    let board = SessionId::new();

    let alice = manager_a.join(board, "Alice").await.unwrap();
    let bob = manager_b.join(board, "Bob").await.unwrap();
    let mut bob_events = bob.events();

    let first = CursorPosition { x: 1.0, y: 1.0 };
    let second = CursorPosition { x: 2.0, y: 2.0 };
    let third = CursorPosition { x: 3.0, y: 3.0 };

    alice.update_cursor(first);
    alice.update_cursor(second);
    alice.update_cursor(third);

    let mut seen = Vec::new();
    while seen.len() < 2 {
        let event = support::wait_for_event(&mut bob_events, Duration::from_secs(30), |e| {
            matches!(e, CollabEvent::CursorMoved { .. })
        })
        .await;
        if let CollabEvent::CursorMoved { cursor, .. } = event {
            seen.push(cursor);
        }
    }

    // Leading edge emits the first position; the burst coalesces to the
    // last one at window end. The middle update is never published.
    assert_eq!(seen, vec![first, third]);
}

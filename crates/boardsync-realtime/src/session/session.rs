//! Per-session bookkeeping for garbage collection.
//!
//! A session entry is created on first attach and swept once the last
//! local attachment is gone and the grace period has elapsed. The grace
//! period tolerates quick reconnects without losing the session entry.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use boardsync_core::types::id::SessionId;

/// Lifecycle bookkeeping for one session this manager is attached to.
#[derive(Debug)]
pub struct Session {
    session_id: SessionId,
    /// Live local attachments to this session.
    local_attachments: AtomicUsize,
    /// When the session became empty, if it currently is.
    empty_since: Mutex<Option<Instant>>,
}

impl Session {
    /// Creates bookkeeping for a session with no attachments yet.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            local_attachments: AtomicUsize::new(0),
            empty_since: Mutex::new(Some(Instant::now())),
        }
    }

    /// The session this entry tracks.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Records a new local attachment, clearing any pending sweep deadline.
    pub fn attach(&self) {
        self.local_attachments.fetch_add(1, Ordering::SeqCst);
        let mut empty_since = self.empty_since.lock().unwrap_or_else(|e| e.into_inner());
        *empty_since = None;
    }

    /// Records a detach; the last one starts the grace clock.
    pub fn detach(&self) {
        let before = self.local_attachments.fetch_sub(1, Ordering::SeqCst);
        if before <= 1 {
            let mut empty_since = self.empty_since.lock().unwrap_or_else(|e| e.into_inner());
            *empty_since = Some(Instant::now());
        }
    }

    /// Current local attachment count.
    pub fn local_attachments(&self) -> usize {
        self.local_attachments.load(Ordering::SeqCst)
    }

    /// Whether the grace period after the last detach has elapsed.
    pub fn sweepable(&self, grace: Duration) -> bool {
        if self.local_attachments() > 0 {
            return false;
        }
        let empty_since = self.empty_since.lock().unwrap_or_else(|e| e.into_inner());
        empty_since.is_some_and(|since| since.elapsed() >= grace)
    }
}

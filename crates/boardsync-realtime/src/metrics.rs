//! Collaboration engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total wire frames sent
    pub frames_sent: AtomicU64,
    /// Total wire frames received
    pub frames_received: AtomicU64,
    /// Broadcasts dropped because the link was down or the buffer full
    pub broadcasts_dropped: AtomicU64,
    /// Participants evicted by the liveness sweep
    pub evictions: AtomicU64,
    /// Successful resumes after transport degradation
    pub reconnects: AtomicU64,
    /// Attachments opened
    pub attachments_opened: AtomicU64,
    /// Attachments closed (explicit leave or retry exhaustion)
    pub attachments_closed: AtomicU64,
    /// Sessions garbage-collected after their grace period
    pub sessions_swept: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sent frame
    pub fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a received frame
    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped broadcast
    pub fn broadcast_dropped(&self) {
        self.broadcasts_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record liveness evictions
    pub fn evicted(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a successful resume
    pub fn reconnected(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an opened attachment
    pub fn attachment_opened(&self) {
        self.attachments_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed attachment
    pub fn attachment_closed(&self) {
        self.attachments_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a swept session
    pub fn session_swept(&self) {
        self.sessions_swept.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            broadcasts_dropped: self.broadcasts_dropped.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            attachments_opened: self.attachments_opened.load(Ordering::Relaxed),
            attachments_closed: self.attachments_closed.load(Ordering::Relaxed),
            sessions_swept: self.sessions_swept.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total wire frames sent
    pub frames_sent: u64,
    /// Total wire frames received
    pub frames_received: u64,
    /// Dropped broadcasts
    pub broadcasts_dropped: u64,
    /// Liveness evictions
    pub evictions: u64,
    /// Successful resumes
    pub reconnects: u64,
    /// Attachments opened
    pub attachments_opened: u64,
    /// Attachments closed
    pub attachments_closed: u64,
    /// Sessions swept
    pub sessions_swept: u64,
}

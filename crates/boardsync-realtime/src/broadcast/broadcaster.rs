//! Change broadcaster — relays mutations to peers, never to any store.
//!
//! Delivery is best-effort and at-most-once: there is no retry and no
//! acknowledgment. A missed live update self-heals on the consumer's next
//! full state fetch, because the authoritative document lives elsewhere.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use boardsync_core::types::id::ParticipantId;

use crate::message::event::ChangeEvent;
use crate::message::wire::WireFrame;
use crate::metrics::EngineMetrics;

/// Fans out frames for one attached participant.
///
/// The sink is rebound by the lifecycle controller on every successful
/// attach and unbound while degraded; publishing without a sink is the
/// silent-drop policy in action, not an error.
#[derive(Debug)]
pub struct ChangeBroadcaster {
    local: ParticipantId,
    sink: Mutex<Option<mpsc::Sender<WireFrame>>>,
    metrics: Arc<EngineMetrics>,
}

impl ChangeBroadcaster {
    /// Creates an unbound broadcaster for the given local participant.
    pub fn new(local: ParticipantId, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            local,
            sink: Mutex::new(None),
            metrics,
        }
    }

    /// Binds the current link's outbound sender.
    pub fn bind(&self, sender: mpsc::Sender<WireFrame>) {
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        *sink = Some(sender);
    }

    /// Drops the sink; subsequent publishes are silently discarded.
    pub fn unbind(&self) {
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        *sink = None;
    }

    /// Fire-and-forget broadcast of a mutation event.
    pub fn send_change(&self, event: ChangeEvent) {
        self.publish(WireFrame::Change { event });
    }

    /// Enqueues a frame on the current link without waiting. Returns
    /// whether the frame was accepted by the link's buffer.
    pub fn publish(&self, frame: WireFrame) -> bool {
        let sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        match sink.as_ref() {
            Some(sender) => match sender.try_send(frame) {
                Ok(()) => {
                    self.metrics.frame_sent();
                    true
                }
                Err(err) => {
                    self.metrics.broadcast_dropped();
                    debug!(local = %self.local, %err, "outbound frame dropped");
                    false
                }
            },
            None => {
                self.metrics.broadcast_dropped();
                debug!(local = %self.local, "broadcast while disconnected, dropped");
                false
            }
        }
    }

    /// No-echo filter for inbound events: everything not originated by the
    /// local participant is accepted.
    pub fn accepts(&self, event: &ChangeEvent) -> bool {
        event.origin != self.local
    }
}

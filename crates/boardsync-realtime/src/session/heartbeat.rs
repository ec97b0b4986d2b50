//! Presence heartbeat cadence and liveness math.
//!
//! Every attachment republishes its presence at a fixed interval. A peer
//! silent for `liveness_multiplier` intervals is presumed dead and evicted
//! as if it had disconnected cleanly — this covers crashed clients and
//! network partitions without relying on a disconnect signal.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use boardsync_core::config::collab::CollabConfig;

/// Heartbeat timer for one attachment.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Interval,
    liveness_timeout: Duration,
}

impl Heartbeat {
    /// Builds the timer from configuration. The first tick fires one full
    /// period after creation; the attach itself already announced presence.
    pub fn new(config: &CollabConfig) -> Self {
        let period = Duration::from_secs(config.heartbeat_interval_seconds);
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            liveness_timeout: Duration::from_secs(config.liveness_timeout_seconds()),
        }
    }

    /// Waits for the next heartbeat tick.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    /// Silence duration after which a peer is presumed dead.
    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }
}

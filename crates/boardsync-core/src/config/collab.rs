//! Collaboration engine configuration.

use serde::{Deserialize, Serialize};

/// Collaboration session manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollabConfig {
    /// Interval between presence heartbeats in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// A participant is presumed dead after `liveness_multiplier` missed
    /// heartbeat intervals.
    #[serde(default = "default_liveness_multiplier")]
    pub liveness_multiplier: u32,
    /// Transport attach (handshake) timeout in seconds.
    #[serde(default = "default_attach_timeout")]
    pub attach_timeout_seconds: u64,
    /// Internal channel buffer size for event and frame channels.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// Suppression window for outbound cursor updates in milliseconds.
    #[serde(default = "default_cursor_throttle")]
    pub cursor_throttle_ms: u64,
    /// How long an empty session is kept alive before being swept, in
    /// seconds. Tolerates quick reconnects without losing the session.
    #[serde(default = "default_session_grace")]
    pub session_grace_seconds: u64,
    /// Maximum accepted wire frame size in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size_bytes: usize,
    /// Reconnect policy for degraded attachments.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

/// Reconnect/backoff policy for the session lifecycle controller.
///
/// These are design defaults, not load-bearing constants; deployments tune
/// them per environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Maximum number of resume attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Backoff delay ceiling in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl CollabConfig {
    /// The silence duration after which a participant is evicted.
    pub fn liveness_timeout_seconds(&self) -> u64 {
        self.heartbeat_interval_seconds * u64::from(self.liveness_multiplier)
    }
}

impl ReconnectPolicy {
    /// Backoff delay in milliseconds for the given attempt (0-based),
    /// doubling each attempt up to the ceiling.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let shifted = self
            .initial_backoff_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        shifted.min(self.max_backoff_ms)
    }
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            liveness_multiplier: default_liveness_multiplier(),
            attach_timeout_seconds: default_attach_timeout(),
            channel_buffer_size: default_channel_buffer(),
            cursor_throttle_ms: default_cursor_throttle(),
            session_grace_seconds: default_session_grace(),
            max_frame_size_bytes: default_max_frame_size(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_liveness_multiplier() -> u32 {
    2
}

fn default_attach_timeout() -> u64 {
    10
}

fn default_channel_buffer() -> usize {
    256
}

fn default_cursor_throttle() -> u64 {
    100
}

fn default_session_grace() -> u64 {
    60
}

fn default_max_frame_size() -> usize {
    65_536
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    1_000
}

fn default_max_backoff() -> u64 {
    30_000
}

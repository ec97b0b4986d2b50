//! Transport substrate configuration.

use serde::{Deserialize, Serialize};

/// Which transport implementation the session manager attaches through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// In-process hub; single-node deployments and tests.
    Memory,
    /// WebSocket client against a relay endpoint.
    Websocket,
}

/// Transport substrate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport implementation to use.
    #[serde(default = "default_mode")]
    pub mode: TransportMode,
    /// Relay endpoint URL for the websocket transport,
    /// e.g. `wss://relay.example.com/sessions`.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            ws_url: default_ws_url(),
        }
    }
}

fn default_mode() -> TransportMode {
    TransportMode::Memory
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:4000/sessions".to_string()
}

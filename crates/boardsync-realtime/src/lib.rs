//! # boardsync-realtime
//!
//! Real-time collaboration engine for BoardSync. Provides:
//!
//! - Presence registry: live participant set per session with cursor and
//!   active-object state, deterministic colors, and liveness eviction
//! - Change broadcaster: best-effort fan-out of board mutations (no-echo)
//! - Session lifecycle controller: attach/heartbeat/reconnect state machine
//!   with bounded exponential backoff
//! - Pluggable transport substrate with in-process and WebSocket
//!   implementations
//!
//! The engine never stores board content; the authoritative document lives
//! in an external store. Everything relayed here is advisory and
//! self-healing via periodic presence sync.

pub mod broadcast;
pub mod events;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod session;
pub mod throttle;
pub mod transport;

pub use broadcast::broadcaster::ChangeBroadcaster;
pub use events::CollabEvent;
pub use message::event::{Change, ChangeEvent};
pub use presence::registry::PresenceRegistry;
pub use session::handle::SessionHandle;
pub use session::lifecycle::LifecycleState;
pub use session::manager::SessionManager;
pub use transport::SessionTransport;
pub use transport::memory::MemoryHub;
pub use transport::ws::WsTransport;

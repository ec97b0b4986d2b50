//! Participant presence tracking.

pub mod color;
pub mod participant;
pub mod registry;

pub use participant::{CursorPosition, ParticipantState, PresencePatch};
pub use registry::PresenceRegistry;

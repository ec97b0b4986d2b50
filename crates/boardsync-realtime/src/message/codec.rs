//! JSON codec for session frames.

use boardsync_core::{CollabError, CollabResult};

use super::wire::WireFrame;

/// Serialize a frame to its JSON wire form.
pub fn encode(frame: &WireFrame) -> CollabResult<String> {
    serde_json::to_string(frame).map_err(Into::into)
}

/// Deserialize an inbound frame, enforcing the size guard.
pub fn decode(raw: &str, max_size: usize) -> CollabResult<WireFrame> {
    if raw.len() > max_size {
        return Err(CollabError::validation(format!(
            "Frame exceeds maximum size of {max_size} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(CollabError::validation("Empty frame"));
    }

    serde_json::from_str(raw).map_err(Into::into)
}

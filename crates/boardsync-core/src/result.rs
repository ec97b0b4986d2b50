//! Convenience result type alias for BoardSync.

use crate::error::CollabError;

/// A specialized `Result` type for BoardSync operations.
///
/// This is defined as a convenience so that every crate does not need to
/// write `Result<T, CollabError>` explicitly.
pub type CollabResult<T> = Result<T, CollabError>;

//! # boardsync-core
//!
//! Core crate for BoardSync. Contains configuration schemas, typed
//! identifiers, and the unified error system.
//!
//! This crate has **no** internal dependencies on other BoardSync crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::CollabError;
pub use result::CollabResult;

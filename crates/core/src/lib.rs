//! Domain types shared across the musegen workspace.
//!
//! Everything the remote-service client and the HTTP API agree on lives
//! here: generation requests with their bounds and defaults, the canonical
//! task status taxonomy, task identifiers, and the core error type.

pub mod error;
pub mod generation;
pub mod status;
pub mod task;

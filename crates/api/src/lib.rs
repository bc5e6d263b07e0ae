//! musegen API server library.
//!
//! Exposes the core building blocks (config, state, error handling, router,
//! routes, persistence) so integration tests and the binary entrypoint can
//! both access them.

pub mod config;
pub mod error;
pub mod persist;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;

//! Client for the ModelScope "muse" image-generation service.
//!
//! The service exposes a submit endpoint and a status endpoint, both of
//! which answer with JSON whose envelope nesting and field casing vary
//! between deployments. This crate wraps that surface behind typed
//! operations:
//!
//! - [`auth`] derives the CSRF header from a raw browser cookie.
//! - [`payload`] builds the submit payload the service expects.
//! - [`client`] owns the HTTP calls (submit, one status probe).
//! - [`envelope`] resolves the varying response envelopes into one
//!   canonical [`envelope::TaskView`].
//! - [`task_id`] recovers a task id from whatever shape the submit
//!   response took.
//! - [`result`] extracts image URLs from a finished task.
//! - [`poller`] drives status probes to a terminal outcome.
//! - [`download`] fetches result images concurrently, preserving order.
//! - [`vision`] captions an image via an OpenAI-compatible endpoint.

pub mod auth;
pub mod client;
pub mod download;
pub mod envelope;
pub mod payload;
pub mod poller;
pub mod result;
pub mod task_id;
pub mod vision;

//! HTTP API for keyword clustering.
//!
//! A synchronous endpoint for small batches, and a job queue with polling
//! for large ones.

mod handlers;
mod rest;
mod server;

pub use handlers::*;
pub use rest::*;
pub use server::run_server;

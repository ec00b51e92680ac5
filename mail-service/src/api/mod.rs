//! HTTP API for mail-service
//!
//! Maps the six endpoints onto the validator, dispatcher, renderer, fetcher
//! and attachment store.

pub mod handlers;
pub mod middleware;
pub mod server;

pub use handlers::AppState;
pub use server::{router, routes, with_middleware, ApiServer};

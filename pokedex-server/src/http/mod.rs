//! HTTP layer
//!
//! Axum server with:
//! - CORS (localhost only by default)
//! - Request tracing and per-request scopes
//! - Graceful shutdown
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod routes;
pub mod scope;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use scope::REQUEST_ID_HEADER;
pub use server::{build_router, run_server, ServerConfig, ServerError};

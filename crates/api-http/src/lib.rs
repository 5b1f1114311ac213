//! HTTP API Layer
//!
//! axum surface of the background sync service: the dispatch endpoint,
//! job status lookups and a health check.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::HttpState;
pub use server::{build_router, HttpServer, HttpServerConfig, HttpServerHandle};

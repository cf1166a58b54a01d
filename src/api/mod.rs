//! HTTP API.
//!
//! Routes are nested under `/api/`. Every response carries the security
//! headers and passes through the access log.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer};
pub use types::ApiContext;

//! HTTP surface — REST routes, WebSocket handler, response envelope.

pub mod responses;
pub mod routes;
pub mod ws;

pub use responses::{ApiError, ApiResponse};
pub use routes::{AppState, api_routes};

//! HTTP surface of the proxy
//!
//! - GET /health - Health check with the number of live sessions
//! - GET /api/session - Issue a short-lived session token
//! - GET /api/flux - WebSocket proxy to the provider (token required)

mod handlers;
mod routes;
mod state;

pub use handlers::{offered_subprotocols, HealthResponse, SessionTokenResponse};
pub use routes::create_router;
pub use state::AppState;

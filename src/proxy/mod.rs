//! Authenticated WebSocket relay between a browser and the provider
//!
//! This module provides the `ProxySession` abstraction that manages:
//! - The provider connection opened on behalf of one browser
//! - The provider→client pump task and the inline client→provider relay
//! - Error frames and close codes reported to the browser
//! - Coordinated teardown through a cancellation token

mod messages;
mod relay;
mod session;
mod stats;

pub use messages::{
    to_client, to_upstream, ErrorCode, ErrorFrame, CLOSE_NORMAL, CLOSE_PROXY_FAILURE,
    CLOSE_UNAUTHORIZED,
};
pub use session::{reject_unauthorized, ProxySession, SessionState};
pub use stats::SessionStats;

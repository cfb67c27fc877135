pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod upstream;

pub use auth::{SessionClaims, TokenIssuer, TokenVerifier, ACCESS_TOKEN_PREFIX};
pub use config::Config;
pub use error::{ProxyError, ProxyResult};
pub use http::{create_router, AppState};
pub use proxy::{ErrorCode, ErrorFrame, ProxySession, SessionState, SessionStats};
pub use upstream::{ConnectionParams, UpstreamConnector};

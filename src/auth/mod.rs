//! Session token issuance and verification
//!
//! Browsers obtain a short-lived HS256 token from `GET /api/session` and
//! present it when opening the proxy WebSocket as a subprotocol value of the
//! form `access_token.<jwt>`. Both sides share the secret from
//! [`AuthConfig`](crate::config::AuthConfig).

mod token;

pub use token::{SessionClaims, TokenIssuer, TokenVerifier, ACCESS_TOKEN_PREFIX};

use crate::auth::{TokenIssuer, TokenVerifier};
use crate::config::Config;
use crate::upstream::UpstreamConnector;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Signs tokens for `GET /api/session`
    pub issuer: TokenIssuer,

    /// Checks tokens offered on the proxy upgrade
    pub verifier: TokenVerifier,

    /// Opens provider connections with the server-held credential
    pub connector: Arc<UpstreamConnector>,

    /// Parent of every session's cancellation token
    pub shutdown: CancellationToken,

    /// Number of proxy sessions currently running
    pub active_sessions: Arc<AtomicUsize>,
}

impl AppState {
    /// Build shared state from the finalized configuration
    pub fn new(config: Config) -> Self {
        let issuer = TokenIssuer::new(&config.auth.session_secret, config.auth.token_ttl_secs);
        let verifier = TokenVerifier::new(&config.auth.session_secret);
        let connector = Arc::new(UpstreamConnector::new(&config.upstream));

        Self {
            issuer,
            verifier,
            connector,
            shutdown: CancellationToken::new(),
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }
}

use thiserror::Error;

pub type ProxyResult<T> = Result<T, ProxyError>;

/// Failures at the proxy's seams (auth, upstream, relay)
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No `access_token.` entry in the offered subprotocols
    #[error("no access_token subprotocol offered")]
    MissingToken,

    /// Token present but signature or expiry check failed
    #[error("invalid access token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    /// Upstream URL or request could not be assembled
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),

    /// DNS, TLS, handshake or auth rejection by the provider
    #[error("{0}")]
    UpstreamConnect(#[source] tokio_tungstenite::tungstenite::Error),

    /// Reading from the provider failed mid-stream
    #[error("{0}")]
    UpstreamReceive(#[source] tokio_tungstenite::tungstenite::Error),

    /// Sending a frame towards the provider failed
    #[error("failed to forward to upstream: {0}")]
    UpstreamSend(#[source] tokio_tungstenite::tungstenite::Error),

    /// Sending a frame towards the browser failed
    #[error("failed to forward to client: {0}")]
    ClientSend(#[source] axum::Error),
}

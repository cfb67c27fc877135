use super::params::ConnectionParams;
use crate::config::UpstreamConfig;
use crate::error::{ProxyError, ProxyResult};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// WebSocket stream to the provider
pub type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens provider connections on behalf of proxy sessions
#[derive(Clone)]
pub struct UpstreamConnector {
    base_url: String,
    model: String,
    /// Full Authorization header value, e.g. `Token <key>`
    authorization: String,
}

impl UpstreamConnector {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            base_url: config.url.clone(),
            model: config.model.clone(),
            authorization: format!("{} {}", config.auth_scheme, config.api_key),
        }
    }

    /// Model sent with every session
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Derive session parameters from the client's raw query string
    pub fn params_from_query(&self, query: Option<&str>) -> ConnectionParams {
        ConnectionParams::from_query(query, &self.model)
    }

    /// Full provider URL for a session
    pub fn url_for(&self, params: &ConnectionParams) -> String {
        params.upstream_url(&self.base_url)
    }

    /// Open the provider connection. No retries; the caller decides what a
    /// failure means for the session.
    pub async fn connect(&self, params: &ConnectionParams) -> ProxyResult<UpstreamStream> {
        let url = self.url_for(params);

        info!(
            "Connecting to provider: model={}, encoding={}, sample_rate={}",
            params.model, params.encoding, params.sample_rate
        );

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(ProxyError::UpstreamConnect)?;

        let auth = HeaderValue::from_str(&self.authorization)
            .map_err(|e| ProxyError::InvalidRequest(format!("authorization header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (stream, response) = connect_async(request)
            .await
            .map_err(ProxyError::UpstreamConnect)?;

        debug!("Provider handshake completed with status {}", response.status());

        Ok(stream)
    }
}

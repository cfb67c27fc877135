// Shared helpers for proxy integration tests
//
// A fake provider is a plain tokio-tungstenite server on a random local port;
// the proxy itself is the real axum router served on another random port.

#![allow(dead_code)]

use flux_proxy::{create_router, AppState, Config};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Response as ClientResponse;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{accept_hdr_async, connect_async, MaybeTlsStream, WebSocketStream};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_SECRET: &str = "test-secret";

pub type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type ProviderWs = WebSocketStream<TcpStream>;

/// What the fake provider saw during the handshake
#[derive(Debug)]
pub struct Handshake {
    /// Path and query of the upgrade request
    pub uri: String,
    pub authorization: Option<String>,
}

/// Fake provider accepting a single connection
pub struct FakeProvider {
    pub addr: SocketAddr,
    pub handshake: oneshot::Receiver<Handshake>,
}

impl FakeProvider {
    /// Base URL to configure the proxy with
    pub fn url(&self) -> String {
        format!("ws://{}/v2/listen", self.addr)
    }
}

/// Start a fake provider that hands its side of the connection to `handler`
pub async fn spawn_provider<F, Fut>(handler: F) -> FakeProvider
where
    F: FnOnce(ProviderWs) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();

        let callback = move |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let authorization = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let _ = tx.send(Handshake {
                uri: req.uri().to_string(),
                authorization,
            });
            Ok(response)
        };

        let ws = accept_hdr_async(stream, callback).await.unwrap();
        handler(ws).await;
    });

    FakeProvider {
        addr,
        handshake: rx,
    }
}

/// Proxy configuration pointing at `upstream_url`
pub fn test_config(upstream_url: &str) -> Config {
    let mut config = Config::default();
    config.upstream.url = upstream_url.to_string();
    config.upstream.api_key = TEST_API_KEY.to_string();
    config.auth.session_secret = TEST_SECRET.to_string();
    config.finalize().unwrap()
}

/// Serve the real router on a random port
pub async fn spawn_proxy(upstream_url: &str) -> (SocketAddr, AppState) {
    let state = AppState::new(test_config(upstream_url));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Subprotocol value carrying a freshly issued token
pub fn access_protocol(state: &AppState) -> String {
    format!("access_token.{}", state.issuer.issue().unwrap())
}

/// Open a client connection to `/api/flux`
pub async fn connect_client(
    addr: SocketAddr,
    query: &str,
    protocols: &[&str],
) -> Result<(ClientWs, ClientResponse), tokio_tungstenite::tungstenite::Error> {
    let mut request = format!("ws://{}/api/flux{}", addr, query)
        .into_client_request()
        .unwrap();

    if !protocols.is_empty() {
        request.headers_mut().insert(
            SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_str(&protocols.join(", ")).unwrap(),
        );
    }

    connect_async(request).await
}

/// Wait until no proxy session is running
pub async fn wait_for_idle(state: &AppState) {
    tokio::time::timeout(TIMEOUT, async {
        while state.active_sessions() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sessions did not shut down");
}

/// A local port with nothing listening on it
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/v2/listen", addr)
}

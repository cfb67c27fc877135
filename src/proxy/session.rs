use super::messages::{
    to_upstream, ErrorCode, ErrorFrame, CLOSE_NORMAL, CLOSE_PROXY_FAILURE, CLOSE_UNAUTHORIZED,
};
use super::relay::{close_client, ClientSink, ClientTx, PumpExit, PumpOutcome, UpstreamPump};
use super::stats::SessionStats;
use crate::error::ProxyError;
use crate::upstream::{ConnectionParams, UpstreamConnector, UpstreamStream};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as UpstreamMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of a proxy session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Client accepted, provider connection not yet open
    Connecting,
    /// Both directions active
    Relaying,
    /// Teardown in progress
    Closing,
    /// Terminal
    Closed,
}

impl SessionState {
    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Relaying) | (Connecting, Closing) | (Relaying, Closing) | (Closing, Closed)
        )
    }
}

/// How the client→provider direction ended
#[derive(Debug)]
enum ClientExit {
    /// Browser closed or dropped the connection
    Disconnected,
    /// Pump finished first (provider closed or failed)
    PumpFinished,
    /// Forwarding to the provider failed
    ForwardFailed,
    /// Cancelled from outside (server shutdown)
    Cancelled,
}

/// One browser connection bridged to one provider connection.
///
/// The provider→client direction runs as a spawned [`UpstreamPump`]; the
/// client→provider direction is driven inline by [`ProxySession::run`]. Either
/// side ending cancels the session token, after which the pump is awaited and
/// the provider connection closed before `run` returns.
pub struct ProxySession {
    id: Uuid,
    state: SessionState,
    connector: Arc<UpstreamConnector>,
    params: ConnectionParams,

    /// Set once when teardown starts
    cancel: CancellationToken,

    /// Fired by the pump when it exits on its own
    pump_done: CancellationToken,

    /// Write half of the provider connection
    upstream_tx: Option<SplitSink<UpstreamStream, UpstreamMessage>>,

    /// Handle for the provider→client task
    forward_task: Option<JoinHandle<PumpOutcome>>,

    started_at: chrono::DateTime<Utc>,
    client_frames: u64,
    upstream_frames: Arc<AtomicU64>,
    close_code: Option<u16>,
    upstream_connected: bool,
}

impl ProxySession {
    /// Create a session. `cancel` is usually a child of the server's
    /// shutdown token.
    pub fn new(
        connector: Arc<UpstreamConnector>,
        params: ConnectionParams,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            connector,
            params,
            cancel,
            pump_done: CancellationToken::new(),
            upstream_tx: None,
            forward_task: None,
            started_at: Utc::now(),
            client_frames: 0,
            upstream_frames: Arc::new(AtomicU64::new(0)),
            close_code: None,
            upstream_connected: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drive the session to completion over an accepted client socket
    pub async fn run(mut self, socket: WebSocket) -> SessionStats {
        info!("[{}] Client connected", self.id);

        let (client_tx, mut client_rx) = socket.split();
        let client: ClientSink = Arc::new(Mutex::new(client_tx));

        let upstream = match self.connector.connect(&self.params).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("[{}] Error connecting to provider: {}", self.id, e);
                self.transition(SessionState::Closing);

                let frame = ErrorFrame::new(ErrorCode::ConnectionFailed, e.to_string());
                let mut tx = client.lock().await;
                if let Err(send_err) = tx.send(frame.to_message()).await {
                    debug!("[{}] Could not report connect failure: {}", self.id, send_err);
                }
                self.record_close(&mut tx, CLOSE_PROXY_FAILURE, "").await;
                drop(tx);

                self.shutdown().await;
                return self.stats();
            }
        };

        info!("[{}] Connected to provider", self.id);
        self.start_pump(upstream, Arc::clone(&client));
        self.transition(SessionState::Relaying);

        let exit = self.relay_client(&mut client_rx).await;
        debug!("[{}] Client relay ended: {:?}", self.id, exit);

        let close = match exit {
            ClientExit::ForwardFailed => Some((CLOSE_PROXY_FAILURE, "")),
            ClientExit::Cancelled => Some((CLOSE_NORMAL, "server shutting down")),
            ClientExit::Disconnected | ClientExit::PumpFinished => None,
        };

        if let Some((code, reason)) = close {
            // Signal teardown before touching the client so the pump stays quiet
            self.transition(SessionState::Closing);
            self.cancel.cancel();

            let mut tx = client.lock().await;
            self.record_close(&mut tx, code, reason).await;
        }

        self.shutdown().await;
        self.stats()
    }

    fn start_pump(&mut self, upstream: UpstreamStream, client: ClientSink) {
        let (upstream_tx, upstream_rx) = upstream.split();

        let pump = UpstreamPump {
            session_id: self.id,
            upstream: upstream_rx,
            client,
            cancel: self.cancel.clone(),
            forwarded: Arc::clone(&self.upstream_frames),
            _done: self.pump_done.clone().drop_guard(),
        };

        self.upstream_tx = Some(upstream_tx);
        self.upstream_connected = true;
        self.forward_task = Some(tokio::spawn(pump.run()));
    }

    /// Forward client frames to the provider until something ends the session
    async fn relay_client(&mut self, client_rx: &mut SplitStream<WebSocket>) -> ClientExit {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ClientExit::Cancelled,
                _ = self.pump_done.cancelled() => return ClientExit::PumpFinished,
                next = client_rx.next() => next,
            };

            let msg = match next {
                Some(Ok(Message::Close(frame))) => {
                    info!(
                        "[{}] Client disconnected: {}",
                        self.id,
                        frame.map(|f| f.code).unwrap_or(1005)
                    );
                    return ClientExit::Disconnected;
                }
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    info!("[{}] Client connection lost: {}", self.id, e);
                    return ClientExit::Disconnected;
                }
                None => {
                    info!("[{}] Client disconnected", self.id);
                    return ClientExit::Disconnected;
                }
            };

            let Some(out) = to_upstream(msg) else {
                continue;
            };

            if let Err(e) = self.send_upstream(out).await {
                error!("[{}] Error forwarding to provider: {}", self.id, e);
                return ClientExit::ForwardFailed;
            }
            self.client_frames += 1;
        }
    }

    async fn send_upstream(&mut self, msg: UpstreamMessage) -> Result<(), ProxyError> {
        let Some(upstream) = self.upstream_tx.as_mut() else {
            return Err(ProxyError::UpstreamSend(WsError::AlreadyClosed));
        };

        upstream.send(msg).await.map_err(ProxyError::UpstreamSend)
    }

    /// Cancel, await the pump, close the provider connection. Idempotent.
    async fn shutdown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if self.state != SessionState::Closing {
            self.transition(SessionState::Closing);
        }

        self.cancel.cancel();

        if let Some(task) = self.forward_task.take() {
            match task.await {
                Ok(outcome) => {
                    if let PumpExit::Failed(e) = &outcome.exit {
                        debug!("[{}] Pump ended with error: {}", self.id, e);
                    }
                    if self.close_code.is_none() {
                        self.close_code = outcome.close_code;
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!("[{}] Forwarding task panicked: {}", self.id, e),
            }
        }

        if let Some(mut upstream) = self.upstream_tx.take() {
            match upstream.close().await {
                Ok(()) => debug!("[{}] Provider connection closed", self.id),
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
                Err(e) => warn!("[{}] Error closing provider connection: {}", self.id, e),
            }
        }

        self.transition(SessionState::Closed);
    }

    /// Close the client and remember the code only if the frame went out
    async fn record_close(&mut self, client: &mut ClientTx, code: u16, reason: &'static str) {
        if close_client(client, code, reason).await && self.close_code.is_none() {
            self.close_code = Some(code);
        }
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "[{}] Ignoring session transition {:?} -> {:?}",
                self.id, self.state, next
            );
            return;
        }
        debug!("[{}] {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let stats = SessionStats {
            session_id: self.id.to_string(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            client_frames: self.client_frames,
            upstream_frames: self.upstream_frames.load(Ordering::Relaxed),
            close_code: self.close_code,
            upstream_connected: self.upstream_connected,
        };

        info!(
            "[{}] Session closed after {:.1}s (client frames={}, provider frames={}, close={:?})",
            self.id, stats.duration_secs, stats.client_frames, stats.upstream_frames, stats.close_code
        );

        stats
    }
}

/// Refuse a client that failed authentication. Nothing upstream is touched.
pub async fn reject_unauthorized(mut socket: WebSocket) {
    let frame = CloseFrame {
        code: CLOSE_UNAUTHORIZED,
        reason: "Unauthorized".into(),
    };

    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!("Client left before auth rejection was sent: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_transitions() {
        use SessionState::*;

        assert!(Connecting.can_transition_to(Relaying));
        assert!(Connecting.can_transition_to(Closing));
        assert!(Relaying.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));

        assert!(!Relaying.can_transition_to(Connecting));
        assert!(!Closed.can_transition_to(Closing));
        assert!(!Connecting.can_transition_to(Closed));
        assert!(!Closing.can_transition_to(Relaying));
    }
}

use super::messages::{to_client, ErrorCode, ErrorFrame, CLOSE_NORMAL};
use crate::error::ProxyError;
use crate::upstream::UpstreamStream;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as UpstreamMessage};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Write half of the browser connection
pub(crate) type ClientTx = SplitSink<WebSocket, Message>;

/// Shared by both directions. Whoever holds the lock owns the right to
/// report and close.
pub(crate) type ClientSink = Arc<Mutex<ClientTx>>;

/// Send one frame to the client
pub(crate) async fn send_client(client: &ClientSink, msg: Message) -> Result<(), ProxyError> {
    client.lock().await.send(msg).await.map_err(ProxyError::ClientSend)
}

/// Best-effort close of the client connection with an application code.
/// Returns whether the close frame was actually written.
pub(crate) async fn close_client(client: &mut ClientTx, code: u16, reason: &'static str) -> bool {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };

    match client.send(Message::Close(Some(frame))).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Client already gone while closing with {}: {}", code, e);
            false
        }
    }
}

/// Why the provider→client pump stopped
#[derive(Debug)]
pub(crate) enum PumpExit {
    /// Session teardown requested; not an error
    Cancelled,
    /// Provider sent a close frame
    UpstreamClosed,
    /// Provider stream ended or the transport dropped without a close frame
    UpstreamEnded,
    /// Reading from the provider or writing to the client failed
    Failed(ProxyError),
}

/// Result handed back to the session when the pump task ends
#[derive(Debug)]
pub(crate) struct PumpOutcome {
    pub exit: PumpExit,
    /// Close code the pump sent to the client, if any
    pub close_code: Option<u16>,
}

/// Provider → client relay loop, run as its own task
pub(crate) struct UpstreamPump {
    pub session_id: Uuid,
    pub upstream: SplitStream<UpstreamStream>,
    pub client: ClientSink,
    pub cancel: CancellationToken,
    pub forwarded: Arc<AtomicU64>,
    /// Held only for its drop: fires the session's `pump_done` token
    pub _done: DropGuard,
}

impl UpstreamPump {
    pub async fn run(mut self) -> PumpOutcome {
        let exit = self.forward().await;

        // Cancel check and writes share the sink lock; the session always
        // cancels before it locks
        let mut client = self.client.lock().await;
        if self.cancel.is_cancelled() {
            return PumpOutcome {
                exit,
                close_code: None,
            };
        }

        if let PumpExit::Failed(e) = &exit {
            error!("[{}] Error forwarding from provider: {}", self.session_id, e);
            let frame = ErrorFrame::new(ErrorCode::ProviderError, e.to_string());
            if let Err(send_err) = client.send(frame.to_message()).await {
                debug!("[{}] Could not report provider error: {}", self.session_id, send_err);
            }
        }

        let closed = close_client(&mut client, CLOSE_NORMAL, "").await;

        PumpOutcome {
            exit,
            close_code: closed.then_some(CLOSE_NORMAL),
        }
    }

    async fn forward(&mut self) -> PumpExit {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                next = self.upstream.next() => next,
            };

            let msg = match next {
                Some(Ok(UpstreamMessage::Close(frame))) => {
                    match frame {
                        Some(frame) => info!(
                            "[{}] Provider connection closed: {} {}",
                            self.session_id,
                            u16::from(frame.code),
                            frame.reason
                        ),
                        None => info!("[{}] Provider connection closed", self.session_id),
                    }
                    return PumpExit::UpstreamClosed;
                }
                Some(Ok(msg)) => msg,
                // Transport went away without a close frame; same as a close
                Some(Err(
                    e @ (WsError::ConnectionClosed
                    | WsError::AlreadyClosed
                    | WsError::Io(_)
                    | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)),
                )) => {
                    info!("[{}] Provider connection closed: {}", self.session_id, e);
                    return PumpExit::UpstreamEnded;
                }
                None => {
                    info!("[{}] Provider stream ended", self.session_id);
                    return PumpExit::UpstreamEnded;
                }
                Some(Err(e)) => return PumpExit::Failed(ProxyError::UpstreamReceive(e)),
            };

            let Some(out) = to_client(msg) else {
                continue;
            };

            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                sent = send_client(&self.client, out) => sent,
            };

            if let Err(e) = sent {
                return PumpExit::Failed(e);
            }
            self.forwarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// Normal closure, sent when the provider ends the stream
pub const CLOSE_NORMAL: u16 = 1000;

/// Provider connect failure or a failed client→provider send
pub const CLOSE_PROXY_FAILURE: u16 = 3000;

/// Upgrade carried no valid session token
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

/// Machine-readable kind carried in an [`ErrorFrame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The provider connection could not be opened
    ConnectionFailed,
    /// The provider stream failed mid-session
    ProviderError,
}

/// JSON error notice sent to the browser as a text frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Always `"Error"`
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub code: ErrorCode,
}

impl ErrorFrame {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            kind: "Error".to_string(),
            description: description.into(),
            code,
        }
    }

    /// Encode as a client text frame
    pub fn to_message(&self) -> Message {
        // Two strings and a unit enum cannot fail to serialize
        let json = serde_json::to_string(self).unwrap_or_default();
        Message::Text(json)
    }
}

/// Map a client frame to its provider equivalent. Only data frames are
/// relayed; control frames are handled by each socket on its own.
pub fn to_upstream(msg: Message) -> Option<UpstreamMessage> {
    match msg {
        Message::Text(text) => Some(UpstreamMessage::Text(text)),
        Message::Binary(data) => Some(UpstreamMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}

/// Map a provider frame to its client equivalent
pub fn to_client(msg: UpstreamMessage) -> Option<Message> {
    match msg {
        UpstreamMessage::Text(text) => Some(Message::Text(text)),
        UpstreamMessage::Binary(data) => Some(Message::Binary(data)),
        _ => None,
    }
}

//! Outbound connection to the transcription provider
//!
//! - `params`: per-session query parameters taken from the client's upgrade URL
//! - `connector`: URL assembly, credential header and the WebSocket handshake

mod connector;
mod params;

pub use connector::{UpstreamConnector, UpstreamStream};
pub use params::ConnectionParams;

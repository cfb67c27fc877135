use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a finished proxy session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier used in log lines
    pub session_id: String,

    /// When the client connection was accepted
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Frames relayed client → provider
    pub client_frames: u64,

    /// Frames relayed provider → client
    pub upstream_frames: u64,

    /// Close code the proxy sent to the client, if it closed first
    pub close_code: Option<u16>,

    /// Whether the provider connection was ever established
    pub upstream_connected: bool,
}

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flux-proxy", version, about = "Authenticated WebSocket proxy to Deepgram Flux")]
pub struct Cli {
    /// Path to the configuration file (optional; environment variables also apply)
    #[arg(short, long, default_value = "config/flux-proxy.toml")]
    pub config: PathBuf,

    /// Bind address (overrides config and HOST)
    #[arg(long)]
    pub bind: Option<String>,

    /// Listen port (overrides config and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Deepgram Flux streaming endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "wss://api.deepgram.com/v2/listen";

/// Model requested for every session; clients cannot override it
pub const DEFAULT_MODEL: &str = "flux-general-en";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub upstream: UpstreamConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "flux-proxy".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

/// Provider connection settings. `api_key` never leaves the server.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub model: String,
    pub api_key: String,
    /// Scheme placed before the key in the Authorization header
    pub auth_scheme: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            auth_scheme: "Token".to_string(),
        }
    }
}

// Keep the key out of logs
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("auth_scheme", &self.auth_scheme)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared by the token issuer and verifier
    pub session_secret: String,
    /// Lifetime of issued session tokens
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            token_ttl_secs: 3600,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl Config {
    /// Load configuration from an optional file, `FLUX__*` environment
    /// variables and the well-known `DEEPGRAM_API_KEY`, `SESSION_SECRET`,
    /// `HOST` and `PORT` variables (highest precedence).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let builder = builder
            .add_source(config::Environment::with_prefix("FLUX").separator("__"))
            .set_override_option("upstream.api_key", std::env::var("DEEPGRAM_API_KEY").ok())?
            .set_override_option("auth.session_secret", std::env::var("SESSION_SECRET").ok())?
            .set_override_option("service.http.bind", std::env::var("HOST").ok())?
            .set_override_option("service.http.port", std::env::var("PORT").ok())?;

        let settings = builder.build().context("Failed to read configuration")?;
        let cfg: Config = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;

        cfg.finalize()
    }

    /// Load configuration from a single file, without environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.finalize()
    }

    /// Validate required values and fill in a per-process signing secret
    /// when none was configured.
    pub fn finalize(mut self) -> Result<Self> {
        if self.upstream.api_key.trim().is_empty() {
            bail!("DEEPGRAM_API_KEY required (set it in the environment or upstream.api_key)");
        }

        if self.upstream.url.trim().is_empty() {
            bail!("upstream.url must not be empty");
        }

        if self.auth.session_secret.is_empty() {
            warn!("No SESSION_SECRET configured; generated a random one for this process");
            self.auth.session_secret = format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            );
        }

        Ok(self)
    }

    /// Socket address string for the HTTP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}

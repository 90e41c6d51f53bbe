//! Runtime configuration for the zaparoo-core gateway.
//!
//! Loading this from a config file on disk is out of scope; the core only
//! consumes an already-populated [`AppConfig`], built via `clap` +
//! environment variables.

/// Configuration for the zaparoo-core server.
#[derive(Debug, Clone, clap::Parser)]
pub struct AppConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "ZAPAROO_HOST")]
    pub host: String,

    /// Port to listen on. This is also the "API port" referenced by the
    /// origin validator: dynamic bare-host origin entries and private-range
    /// IP origins are only trusted on this port.
    #[arg(long, default_value_t = 7497, env = "ZAPAROO_PORT")]
    pub port: u16,

    /// Shared API key. If unset, API-key auth is disabled (local/dev mode).
    #[arg(long, env = "ZAPAROO_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Additional CORS/streaming-upgrade origins beyond the static
    /// mobile-runtime and loopback/NIC/hostname list ("dynamic allow-list").
    /// Comma-separated on the CLI.
    #[arg(long, value_delimiter = ',', env = "ZAPAROO_ALLOWED_ORIGINS")]
    pub allowed_origins: Vec<String>,

    /// mDNS hostname to add to the static origin allow-list, if advertised.
    #[arg(long, env = "ZAPAROO_MDNS_HOSTNAME")]
    pub mdns_hostname: Option<String>,

    /// Default per-request handler timeout, in seconds.
    #[arg(long, default_value_t = 30, env = "ZAPAROO_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// Graceful-shutdown drain window, in seconds.
    #[arg(long, default_value_t = 30, env = "ZAPAROO_DRAIN_TIMEOUT_SECS")]
    pub drain_timeout_secs: u64,

    /// Per-IP rate limit, requests per second, applied to `/api*` routes
    /// and to streaming inbound messages.
    #[arg(long, default_value_t = 20, env = "ZAPAROO_RATE_LIMIT_RPS")]
    pub rate_limit_rps: u32,

    /// Rate limit burst allowance.
    #[arg(long, default_value_t = 40, env = "ZAPAROO_RATE_LIMIT_BURST")]
    pub rate_limit_burst: u32,

    /// Pairing session lifetime, in seconds.
    #[arg(long, default_value_t = 300, env = "ZAPAROO_PAIRING_TOKEN_EXPIRY_SECS")]
    pub pairing_token_expiry_secs: u64,

    /// Maximum pairing-completion attempts before a session is discarded.
    #[arg(long, default_value_t = 10, env = "ZAPAROO_PAIRING_ATTEMPT_LIMIT")]
    pub pairing_attempt_limit: u32,

    /// Auto-detector tick interval, in milliseconds.
    #[arg(long, default_value_t = 3000, env = "ZAPAROO_AUTODETECT_INTERVAL_MS")]
    pub autodetect_interval_ms: u64,

    /// Enable `/debug/*` profiling endpoints (dev builds only).
    #[arg(long, env = "ZAPAROO_DEV")]
    pub dev: bool,
}

impl AppConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn drain_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn autodetect_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.autodetect_interval_ms)
    }

    pub fn pairing_token_expiry(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.pairing_token_expiry_secs)
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7497,
            auth_token: None,
            allowed_origins: Vec::new(),
            mdns_hostname: None,
            request_timeout_secs: 30,
            drain_timeout_secs: 30,
            rate_limit_rps: 20,
            rate_limit_burst: 40,
            pairing_token_expiry_secs: 300,
            pairing_attempt_limit: 10,
            autodetect_interval_ms: 3000,
            dev: false,
        }
    }
}

use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use zero_link_policy::{RateLimitConfig, RateLimitRule};

/// Server configuration
#[derive(Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Path to RocksDB database
    pub database_path: PathBuf,

    /// Token encryption key (hex-encoded 32 bytes)
    pub token_encryption_key: String,

    /// Public base URL; every provider callback URL derives from it
    pub public_base_url: String,

    /// Where the browser lands after a successful login or link
    pub post_login_redirect: String,

    /// Where the browser lands after a failure (`?error=<code>` is appended)
    pub error_redirect: String,

    /// Proxies allowed to set `X-Forwarded-For`
    pub trusted_proxies: Vec<IpAddr>,

    /// Per-endpoint rate limits
    pub rate_limits: RateLimitConfig,

    /// Bound on every provider HTTP call
    pub provider_http_timeout: Duration,

    /// Period of the background refresh sweep
    pub token_sweep_interval: Duration,

    /// Lifetime of sessions issued by this server (seconds)
    pub session_ttl: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("database_path", &self.database_path)
            .field("token_encryption_key", &"<redacted>")
            .field("public_base_url", &self.public_base_url)
            .field("post_login_redirect", &self.post_login_redirect)
            .field("error_redirect", &self.error_redirect)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("rate_limits", &self.rate_limits)
            .field("provider_http_timeout", &self.provider_http_timeout)
            .field("token_sweep_interval", &self.token_sweep_interval)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let bind_address = var("BIND_ADDRESS", "127.0.0.1:8080")
            .parse()
            .context("BIND_ADDRESS is not a socket address")?;

        let database_path = var("DATABASE_PATH", "./data/zero-link.db").into();

        let token_encryption_key = lookup("TOKEN_ENCRYPTION_KEY")
            .context("TOKEN_ENCRYPTION_KEY environment variable required")?;
        if token_encryption_key.trim().len() != 64 {
            anyhow::bail!("TOKEN_ENCRYPTION_KEY must be 32 bytes (64 hex chars)");
        }

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .context("PUBLIC_BASE_URL environment variable required")?
            .trim_end_matches('/')
            .to_string();
        if !public_base_url.starts_with("https://") && !public_base_url.starts_with("http://") {
            anyhow::bail!("PUBLIC_BASE_URL must be an absolute http(s) URL");
        }

        let trusted_proxies = var("TRUSTED_PROXIES", "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<IpAddr>()
                    .with_context(|| format!("TRUSTED_PROXIES entry '{}' is not an IP", s))
            })
            .collect::<Result<Vec<_>>>()?;

        let rate_limits = RateLimitConfig {
            initiate: RateLimitRule::per_minute(
                var("RATE_LIMIT_INITIATE_PER_MINUTE", "10").parse()?,
            ),
            callback: RateLimitRule::per_minute(
                var("RATE_LIMIT_CALLBACK_PER_MINUTE", "20").parse()?,
            ),
            credentials: RateLimitRule::per_minute(
                var("RATE_LIMIT_CREDENTIALS_PER_MINUTE", "5").parse()?,
            ),
        };

        let provider_http_timeout =
            Duration::from_secs(var("PROVIDER_HTTP_TIMEOUT_SECONDS", "10").parse()?);
        let token_sweep_interval =
            Duration::from_secs(var("TOKEN_SWEEP_INTERVAL_SECONDS", "600").parse()?);
        let session_ttl = var("SESSION_TTL_SECONDS", "86400").parse()?; // 24 hours

        Ok(Config {
            bind_address,
            database_path,
            token_encryption_key,
            public_base_url,
            post_login_redirect: var("POST_LOGIN_REDIRECT", "/"),
            error_redirect: var("ERROR_REDIRECT", "/login/error"),
            trusted_proxies,
            rate_limits,
            provider_http_timeout,
            token_sweep_interval,
            session_ttl,
        })
    }
}

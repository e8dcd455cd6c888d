//! Server configuration.
//!
//! Layered loading: `authgate.toml` (if present), then environment variable
//! overrides with the `AUTHGATE` prefix, e.g. `AUTHGATE__SERVER__PORT=9090`
//! or `AUTHGATE__AUTH__ACCESS_SECRET=...`.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use authgate_auth::AuthConfig;

// ============================================================================
// Sections
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Redis configuration for the shared key-value store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Enable Redis (the server gracefully degrades without it).
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379").
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Key namespace prepended to every key.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

fn default_redis_prefix() -> String {
    "authgate:".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            prefix: default_redis_prefix(),
        }
    }
}

/// Login rate limiting (fixed window per client address).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting on the login endpoint.
    pub enabled: bool,

    /// Window length.
    #[serde(with = "humantime_serde")]
    pub login_window: Duration,

    /// Requests allowed per window per client.
    pub login_max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login_window: Duration::from_secs(60),
            login_max_requests: 10,
        }
    }
}

// ============================================================================
// App Config
// ============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener.
    pub server: ServerConfig,

    /// Shared key-value store.
    pub redis: RedisConfig,

    /// Token secrets and lifetimes.
    pub auth: AuthConfig,

    /// Login rate limiting.
    pub rate_limit: RateLimitConfig,
}

/// Loads configuration from an optional TOML file plus environment overrides.
///
/// # Errors
///
/// Returns an error when the file or environment cannot be parsed, or when
/// the merged configuration fails validation (e.g. missing token secrets).
pub fn load_config(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut builder = Config::builder();

    let path = PathBuf::from(path.unwrap_or("authgate.toml"));
    if path.exists() {
        builder = builder.add_source(File::from(path));
    }

    builder = builder.add_source(
        Environment::with_prefix("AUTHGATE")
            .try_parsing(true)
            .separator("__"),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.auth.validate()?;
    Ok(cfg)
}

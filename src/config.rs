//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//! The resulting [`Config`] is built once at startup and shared read-only.
//!
//! # Security Configuration
//!
//! - `SIGNING_SECRET`: Shared HMAC key used by the website to sign requests (required)
//! - `PUBLIC_URL`: Origin the website signs against (default: `http://localhost:3000`)
//! - `REPLAY_WINDOW_SECS`: Accepted clock skew for `X-Timestamp` (default: 300)
//!
//! # Upload Handling
//!
//! - `SCRATCH_ROOT`: Directory holding per-request workspaces
//! - `MAX_REQUEST_BODY_SIZE`: Streamed body cap for upload routes (default: 512MB)
//! - `MAX_JSON_BODY_SIZE`: Body cap for JSON routes (default: 1MB)
//! - `SCRATCH_MAX_AGE_SECS` / `SCRATCH_SWEEP_INTERVAL_SECS`: Orphaned workspace janitor

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Name of the directory created under the OS temp dir when `SCRATCH_ROOT` is unset.
pub const DEFAULT_SCRATCH_DIR: &str = "submission-gateway";

/// Shared HMAC secret.
///
/// Wrapped so that deriving `Debug` on [`Config`] never prints key material.
#[derive(Clone, Default)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret([redacted])")
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Request Authentication
    // =========================================================================
    /// Shared HMAC-SHA256 key
    pub signing_secret: SigningSecret,

    /// Origin prepended to the request path when building the canonical URL.
    /// Must match what the website uses when signing (no trailing slash needed).
    pub public_url: String,

    /// Maximum distance between `X-Timestamp` and the server clock (default: 5 minutes)
    pub replay_window: Duration,

    // =========================================================================
    // Upload Handling
    // =========================================================================
    /// Root directory for per-request scratch workspaces
    pub scratch_root: PathBuf,

    /// Workspaces older than this are considered orphaned (default: 1 hour)
    pub scratch_max_age: Duration,

    /// How often the janitor sweeps the scratch root (default: 5 minutes, 0 = disabled)
    pub scratch_sweep_interval: Duration,

    /// Maximum streamed body size for upload routes (default: 512MB)
    pub max_request_body_size: usize,

    /// Maximum body size for JSON routes (default: 1MB)
    pub max_json_body_size: usize,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any required configuration is missing
    /// or invalid (e.g., no `SIGNING_SECRET`, non-numeric `PORT`).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let signing_secret = env::var("SIGNING_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SigningSecret::new)
            .ok_or_else(|| AppError::ConfigError("SIGNING_SECRET must be set".to_string()))?;

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            // Authentication
            signing_secret,
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            replay_window: Duration::from_secs(Self::parse_env("REPLAY_WINDOW_SECS", 300)?),

            // Uploads
            scratch_root: env::var("SCRATCH_ROOT")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_scratch_root),
            scratch_max_age: Duration::from_secs(Self::parse_env("SCRATCH_MAX_AGE_SECS", 3600)?),
            scratch_sweep_interval: Duration::from_secs(Self::parse_env(
                "SCRATCH_SWEEP_INTERVAL_SECS",
                300,
            )?),
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 512 * 1024 * 1024)?, // 512MB
            max_json_body_size: Self::parse_env("MAX_JSON_BODY_SIZE", 1024 * 1024)?, // 1MB

            // Observability
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.signing_secret.is_empty() {
            return Err(AppError::ConfigError(
                "SIGNING_SECRET must not be empty".to_string(),
            ));
        }

        if !(self.public_url.starts_with("http://") || self.public_url.starts_with("https://")) {
            return Err(AppError::ConfigError(format!(
                "PUBLIC_URL must be an http(s) origin, got {:?}",
                self.public_url
            )));
        }

        if self.replay_window.is_zero() {
            return Err(AppError::ConfigError(
                "REPLAY_WINDOW_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.max_json_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_JSON_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.scratch_max_age.is_zero() {
            return Err(AppError::ConfigError(
                "SCRATCH_MAX_AGE_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origin used for canonical URLs, without a trailing slash.
    pub fn canonical_origin(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    /// Check if the orphaned workspace janitor should run.
    pub fn janitor_enabled(&self) -> bool {
        !self.scratch_sweep_interval.is_zero()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

fn default_scratch_root() -> PathBuf {
    env::temp_dir().join(DEFAULT_SCRATCH_DIR)
}

/// Default configuration for testing and development.
///
/// Carries a fixed, publicly known signing secret. Production deployments
/// should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            // Authentication
            signing_secret: SigningSecret::new("insecure-development-secret"),
            public_url: "http://localhost:3000".to_string(),
            replay_window: Duration::from_secs(300),
            // Uploads
            scratch_root: default_scratch_root(),
            scratch_max_age: Duration::from_secs(3600),
            scratch_sweep_interval: Duration::from_secs(300),
            max_request_body_size: 512 * 1024 * 1024,
            max_json_body_size: 1024 * 1024,
            // Observability
            metrics_port: 9090,
        }
    }
}

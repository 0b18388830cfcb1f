//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following
//! precedence (highest to lowest):
//! 1. Environment variables (prefix: RESERVATION_)
//! 2. Current working directory: ./config.toml
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::version::{ApiVersion, VersionRange};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// API version bounds
    #[serde(default)]
    pub api: ApiConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Supported microversion bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Minimum supported version, used when the header is absent
    #[serde(default = "default_min_version")]
    pub min_version: String,

    /// Maximum supported version, used for the `latest` token
    #[serde(default = "default_max_version")]
    pub max_version: String,
}

impl ApiConfig {
    /// Parse the configured bounds into a [`VersionRange`]
    pub fn version_range(&self) -> Result<VersionRange> {
        let min = ApiVersion::parse(&self.min_version)?;
        let max = ApiVersion::parse(&self.max_version)?;
        Ok(VersionRange::new(min, max))
    }
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request body size limit in megabytes
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// CORS mode: "permissive", "restrictive", or "disabled"
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,
}

fn default_port() -> u16 {
    1234
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_min_version() -> String {
    "1.0".to_string()
}

fn default_max_version() -> String {
    "1.2".to_string()
}

fn default_body_limit_mb() -> usize {
    2
}

fn default_cors_mode() -> String {
    "restrictive".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            api: ApiConfig::default(),
            middleware: MiddlewareConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "reservation-gateway".to_string(),
            port: default_port(),
            log_level: default_log_level(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            min_version: default_min_version(),
            max_version: default_max_version(),
        }
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_mb: default_body_limit_mb(),
            cors_mode: default_cors_mode(),
        }
    }
}

impl Config {
    /// Load configuration from ./config.toml and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file
    ///
    /// Useful for testing or non-standard deployments; environment variables
    /// (RESERVATION_ prefix) still override the file.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("RESERVATION_").split("_"))
            .extract()?;

        Ok(config)
    }
}

//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use serde::{Deserialize, Serialize};
use std::env;

/// Environment name that enables production-only behavior
pub const PRODUCTION_ENV: &str = "production";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (local, staging, production)
    pub env: String,

    /// CDN base URL used to build asset links
    pub cdn_url: String,

    /// Runtime configuration
    pub rust_log: String,
    pub log_format: LogFormat,
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(crate::Error::Configuration(format!(
                "Unknown log format: {}. Supported formats: pretty, json",
                other
            ))),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()),
            cdn_url: env::var("CDN_URL").unwrap_or_default(),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "mucts=info".to_string()),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse()?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == PRODUCTION_ENV
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "local".to_string(),
            cdn_url: String::new(),
            rust_log: "mucts=info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

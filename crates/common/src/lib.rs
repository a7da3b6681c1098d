//! Shared configuration, API error shaping, and tracing for MuCTS helpers
//!
//! This crate provides common functionality used across the workspace:
//! - `ApiError`, the structured HTTP error returned by API handlers
//! - `MessageBag`, the ordered field-error collection it carries
//! - Configuration management following 12-factor principles
//! - Tracing subscriber setup for binaries

pub mod api_error;
pub mod config;
pub mod error;
pub mod message_bag;
pub mod telemetry;

pub use api_error::{api_error, ApiError};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use message_bag::MessageBag;

//! Supervisao Core - Foundation crate for the supervision report filing agent.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Validation and configuration errors using thiserror
//! - [`config`] - TOML-based configuration with env overrides and startup validation
//! - [`types`] - Shared newtypes and the queued [`ReportRecord`]
//!
//! # Example
//!
//! ```rust
//! use supervisao_core::AppConfig;
//!
//! let config = AppConfig::default();
//! // An unconfigured portal never passes startup validation
//! assert!(config.validate().is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, DatabaseConfig, PortalConfig, WorkerConfig, DEFAULT_CONFIG_FILE,
};
pub use error::{ConfigError, ConfigResult, SupervisaoError};
pub use types::{OwnerId, ReportId, ReportRecord, ReportStatus, Timestamp};

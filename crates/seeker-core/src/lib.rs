//! Seeker Core - Foundation crate for the Seeker username-discovery engine.
//!
//! This crate provides shared types, error handling, and configuration
//! management that all other Seeker crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Config and validation error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and domain records (`Username`, `JobId`,
//!   `ResultStatus`, `ProviderResult`, `Profile`)

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
    AddonsConfig, AppConfig, FaceRestoreConfig, JobsConfig, ProxyConfig, ScanningConfig,
};
pub use error::{ConfigError, ConfigResult, Result, SeekerError};
pub use types::{FaceMatch, JobId, Profile, ProviderResult, ResultStatus, Username};

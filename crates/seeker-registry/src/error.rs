//! Error types for the provider registry subsystem.

use thiserror::Error;

/// Errors that can occur in registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Provider descriptor not found
    #[error("provider not found: {name}")]
    NotFound {
        /// The provider name that was not found
        name: String,
    },

    /// Failed to read a provider document from disk
    #[error("failed to load provider document from {path}: {source}")]
    LoadError {
        /// Path to the document
        path: String,
        /// Underlying error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse a provider YAML document
    #[error("failed to parse provider YAML in {path}: {source}")]
    ParseError {
        /// Path to the document
        path: String,
        /// YAML parse error
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid provider descriptor (validation or pattern compilation failed)
    #[error("invalid provider descriptor for {name}: {reason}")]
    ValidationError {
        /// Provider name being validated
        name: String,
        /// Reason for validation failure
        reason: String,
    },

    /// I/O error while accessing provider documents
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

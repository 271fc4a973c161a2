//! Seeker Registry - Provider descriptor system for username probing.
//!
//! This crate provides the data-driven side of the provider model. It
//! handles loading YAML descriptor documents, compiling their match
//! patterns, and exposing a stable ordered provider list that can be
//! reloaded atomically while scans are in flight.
//!
//! # Architecture
//!
//! - **Descriptor Types** ([`descriptor`]): Strongly-typed provider descriptors
//!   compiled from YAML, including pattern sets and UA profiles
//! - **Loader** ([`loader`]): YAML document loading from a file and a
//!   directory of plugin packs
//! - **Registry** ([`registry`]): Copy-on-write snapshot registry with
//!   code-driver override
//! - **Errors** ([`error`]): Registry-specific error types
//!
//! # Example
//!
//! ```rust,no_run
//! use seeker_registry::{ProviderLoader, ProviderRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = ProviderLoader::new("providers.yaml");
//! let registry = ProviderRegistry::load_from(&loader, vec![])?;
//!
//! for entry in registry.snapshot().entries() {
//!     println!("provider: {}", entry.name());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod descriptor;
pub mod error;
pub mod loader;
pub mod registry;

// Re-export commonly used types
pub use descriptor::{
    ua_profile, Pattern, PatternSet, Provider, ProviderSpec, UaProfile, DEFAULT_UA_PROFILE,
    UA_PROFILES,
};
pub use error::{RegistryError, Result};
pub use loader::ProviderLoader;
pub use registry::{ProviderKind, ProviderRegistry, RegistryEntry, RegistrySnapshot};

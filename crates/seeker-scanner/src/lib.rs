//! Seeker Scanner - Username probing infrastructure.
//!
//! This crate fans a username out across providers and turns each probe
//! into a classified result with an extracted profile. It coordinates
//! HTTP clients, rate control, response classification, and both
//! data-driven and code-backed drivers.
//!
//! # Features
//!
//! - Shared HTTP clients with UA profiles, redirect caps, body caps,
//!   and a SOCKS5h path for `.onion` hosts
//! - Global concurrency cap plus per-host token-bucket pacing
//! - Pattern- and status-based response classification
//! - Metadata extraction (JSON-LD, OpenGraph, Twitter-Card)
//! - Cooperative cancellation with per-provider and job-wide deadlines

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod classify;
pub mod client;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod extract;
pub mod limiter;
pub mod probe;

// Re-export commonly used types
pub use classify::{classify, ClassifyInput, BLOCK_HINTS};
pub use client::{ClientFactory, FetchedPage};
pub use engine::ScanEngine;
pub use error::{Result, ScanError};
pub use extract::{extract_html, ExtractedMeta};
pub use limiter::{RateController, RatePermit};
pub use probe::{GenericProber, ProbeContext, Prober};

//! Code-backed provider drivers.
//!
//! These implement the same [`crate::probe::Prober`] contract as the
//! generic data driver but may hit bespoke API endpoints and merge
//! multiple responses. A code driver registered under a name replaces
//! a YAML descriptor of that name.

mod github;
mod hibp;
mod reddit;

pub use github::GitHubProber;
pub use hibp::HibpProber;
pub use reddit::RedditProber;

use crate::probe::Prober;
use std::sync::Arc;

/// Build the default code driver set, in registration order.
///
/// `hibp_api_key` enables the HIBP breach lookup; without it the driver
/// still registers and reports itself unconfigured.
#[must_use]
pub fn default_drivers(hibp_api_key: Option<String>) -> Vec<Arc<dyn Prober>> {
    vec![
        Arc::new(GitHubProber::new()),
        Arc::new(RedditProber::new()),
        Arc::new(HibpProber::new(hibp_api_key)),
    ]
}

//! Copy-on-write provider registry with code-driver override.
//!
//! The registry merges code-declared driver names with YAML-declared
//! descriptors into one stable ordered list: code drivers first, in
//! registration order, then data providers in document order. A code
//! driver replaces a data descriptor of the same name (the override is
//! logged). `reload` rebuilds the whole snapshot and swaps it in
//! atomically; readers keep whatever snapshot they started with.

use crate::descriptor::Provider;
use crate::error::Result;
use crate::loader::ProviderLoader;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// How a registry entry is implemented.
#[derive(Debug, Clone)]
pub enum ProviderKind {
    /// Backed by a registered code driver; the scan engine resolves the
    /// implementation by name
    Code,
    /// Backed by the generic data driver and this compiled descriptor
    Data(Arc<Provider>),
}

/// One named entry in the ordered provider list.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    name: String,
    kind: ProviderKind,
}

impl RegistryEntry {
    /// Provider name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Implementation kind.
    #[must_use]
    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    /// Compiled descriptor for data-backed entries.
    #[must_use]
    pub fn descriptor(&self) -> Option<&Arc<Provider>> {
        match &self.kind {
            ProviderKind::Data(p) => Some(p),
            ProviderKind::Code => None,
        }
    }
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    entries: Vec<RegistryEntry>,
    by_name: HashMap<String, usize>,
}

impl RegistrySnapshot {
    /// Ordered provider entries: code drivers first, then data providers.
    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Look up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Whether a provider name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Ordered provider names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn build(code_names: &[String], data: Vec<Provider>) -> Self {
        let mut entries = Vec::with_capacity(code_names.len() + data.len());
        let mut by_name = HashMap::new();

        for name in code_names {
            if by_name.contains_key(name) {
                debug!(provider = %name, "duplicate code driver registration ignored");
                continue;
            }
            by_name.insert(name.clone(), entries.len());
            entries.push(RegistryEntry {
                name: name.clone(),
                kind: ProviderKind::Code,
            });
        }

        for provider in data {
            if by_name.contains_key(&provider.name) {
                info!(provider = %provider.name, "code driver overrides YAML descriptor");
                continue;
            }
            by_name.insert(provider.name.clone(), entries.len());
            entries.push(RegistryEntry {
                name: provider.name.clone(),
                kind: ProviderKind::Data(Arc::new(provider)),
            });
        }

        Self { entries, by_name }
    }
}

/// Provider registry holding an atomically replaceable snapshot.
pub struct ProviderRegistry {
    code_names: Vec<String>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl ProviderRegistry {
    /// Create a registry with only code drivers registered.
    #[must_use]
    pub fn new(code_names: Vec<String>) -> Self {
        let snapshot = RegistrySnapshot::build(&code_names, Vec::new());
        Self {
            code_names,
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Create a registry and load descriptors from the given loader.
    ///
    /// # Errors
    /// Returns error if loading fails.
    pub fn load_from(loader: &ProviderLoader, code_names: Vec<String>) -> Result<Self> {
        let registry = Self::new(code_names);
        registry.reload(loader)?;
        Ok(registry)
    }

    /// Rebuild the snapshot from the loader and swap it in atomically.
    ///
    /// Scans in flight keep the snapshot they resolved at submit time.
    ///
    /// # Errors
    /// Returns error if loading fails; the previous snapshot stays
    /// installed in that case.
    pub fn reload(&self, loader: &ProviderLoader) -> Result<()> {
        let data = loader.load_all()?;
        let next = Arc::new(RegistrySnapshot::build(&self.code_names, data));

        let mut guard = self
            .snapshot
            .write()
            .expect("acquire write lock on registry snapshot");
        *guard = next;

        info!(count = guard.len(), "reloaded provider registry");

        Ok(())
    }

    /// Get the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot
            .read()
            .expect("acquire read lock on registry snapshot")
            .clone()
    }
}

//! Provider document loading from YAML files.
//!
//! A provider document is a YAML map of provider name to descriptor.
//! The loader reads one base file plus an optional directory of plugin
//! packs (`*.yml` / `*.yaml`, sorted by file name), preserving document
//! order so the registry can expose a stable provider list.

use crate::descriptor::{Provider, ProviderSpec};
use crate::error::{RegistryError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Loader for provider documents.
pub struct ProviderLoader {
    base_file: Option<PathBuf>,
    pack_dir: Option<PathBuf>,
}

impl ProviderLoader {
    /// Create a loader reading a single base document.
    ///
    /// A missing base file is tolerated at load time (deployments may
    /// ship packs only).
    pub fn new(base_file: impl Into<PathBuf>) -> Self {
        Self {
            base_file: Some(base_file.into()),
            pack_dir: None,
        }
    }

    /// Also read plugin packs from a directory of YAML files.
    ///
    /// Packs are loaded after the base document in file-name order;
    /// later documents override earlier ones by provider name.
    #[must_use]
    pub fn with_pack_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pack_dir = Some(dir.into());
        self
    }

    /// Load and compile all provider descriptors.
    ///
    /// Invalid descriptors are logged as warnings and skipped; a
    /// malformed pack file is skipped as a whole. Order is base file
    /// first, then packs by file name, each in document order.
    ///
    /// # Errors
    /// Returns error only when a declared input exists but can't be read.
    pub fn load_all(&self) -> Result<Vec<Provider>> {
        let mut providers: Vec<Provider> = Vec::new();

        if let Some(base) = &self.base_file {
            if base.exists() {
                Self::load_file_into(base, &mut providers)?;
            }
        }

        if let Some(dir) = &self.pack_dir {
            if dir.is_dir() {
                let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
                    .filter_map(std::result::Result::ok)
                    .map(|e| e.path())
                    .filter(|p| {
                        matches!(
                            p.extension().and_then(|s| s.to_str()),
                            Some("yml" | "yaml")
                        )
                    })
                    .collect();
                paths.sort();

                for path in paths {
                    if let Err(e) = Self::load_file_into(&path, &mut providers) {
                        warn!(path = %path.display(), error = %e, "skipping provider pack");
                    }
                }
            }
        }

        info!(count = providers.len(), "loaded provider descriptors");

        Ok(providers)
    }

    /// Parse one YAML document and append its compiled providers.
    ///
    /// Later occurrences of a name replace earlier ones in place, so
    /// the first occurrence keeps its position in the ordered list.
    fn load_file_into(path: &Path, providers: &mut Vec<Provider>) -> Result<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| RegistryError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        let doc: serde_yaml::Value =
            serde_yaml::from_str(&contents).map_err(|e| RegistryError::ParseError {
                path: path.display().to_string(),
                source: e,
            })?;

        let mapping = match doc {
            serde_yaml::Value::Mapping(mapping) => mapping,
            // An empty document parses as null; treat it as no providers.
            serde_yaml::Value::Null => return Ok(()),
            _ => {
                warn!(path = %path.display(), "provider document is not a map, skipping");
                return Ok(());
            }
        };

        for (key, value) in mapping {
            let Some(name) = key.as_str().map(str::to_string) else {
                warn!(path = %path.display(), "skipping non-string provider key");
                continue;
            };

            let spec: ProviderSpec = match serde_yaml::from_value(value) {
                Ok(spec) => spec,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        provider = %name,
                        error = %e,
                        "skipping malformed provider descriptor"
                    );
                    continue;
                }
            };

            match Provider::compile(&name, &spec) {
                Ok(provider) => {
                    if let Some(existing) =
                        providers.iter_mut().find(|p| p.name == provider.name)
                    {
                        *existing = provider;
                    } else {
                        providers.push(provider);
                    }
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        provider = %name,
                        error = %e,
                        "skipping invalid provider descriptor"
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_base(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("providers.yaml");
        fs::write(&path, contents).expect("write providers.yaml");
        path
    }

    #[test]
    fn test_load_base_document_in_order() {
        let tmp = TempDir::new().expect("create temp dir");
        let base = write_base(
            &tmp,
            r#"
alpha:
  url: "https://alpha.test/{username}"
  success_patterns: ["profile"]
beta:
  url: "https://beta.test/u/{username}"
  timeout: 5
"#,
        );

        let providers = ProviderLoader::new(base).load_all().expect("load");
        let names: Vec<_> = providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(providers[1].timeout.as_secs(), 5);
    }

    #[test]
    fn test_missing_base_file_is_empty() {
        let providers = ProviderLoader::new("/nonexistent/providers.yaml")
            .load_all()
            .expect("load");
        assert!(providers.is_empty());
    }

    #[test]
    fn test_invalid_descriptor_is_skipped() {
        let tmp = TempDir::new().expect("create temp dir");
        let base = write_base(
            &tmp,
            r#"
good:
  url: "https://good.test/{username}"
no_placeholder:
  url: "https://bad.test/fixed"
bad_shape: "just a string"
"#,
        );

        let providers = ProviderLoader::new(base).load_all().expect("load");
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name, "good");
    }

    #[test]
    fn test_pack_dir_sorted_and_overriding() {
        let tmp = TempDir::new().expect("create temp dir");
        let base = write_base(
            &tmp,
            r#"
alpha:
  url: "https://alpha.test/{username}"
  timeout: 3
"#,
        );

        let packs = tmp.path().join("packs");
        fs::create_dir(&packs).expect("create packs dir");
        fs::write(
            packs.join("10-extra.yaml"),
            "gamma:\n  url: \"https://gamma.test/{username}\"\n",
        )
        .expect("write pack");
        fs::write(
            packs.join("20-override.yml"),
            "alpha:\n  url: \"https://alpha.test/{username}\"\n  timeout: 9\n",
        )
        .expect("write pack");

        let providers = ProviderLoader::new(base)
            .with_pack_dir(&packs)
            .load_all()
            .expect("load");

        let names: Vec<_> = providers.iter().map(|p| p.name.as_str()).collect();
        // Override replaces in place; first occurrence keeps its slot.
        assert_eq!(names, vec!["alpha", "gamma"]);
        assert_eq!(providers[0].timeout.as_secs(), 9);
    }

    #[test]
    fn test_malformed_pack_file_is_skipped() {
        let tmp = TempDir::new().expect("create temp dir");
        let base = write_base(&tmp, "alpha:\n  url: \"https://alpha.test/{username}\"\n");

        let packs = tmp.path().join("packs");
        fs::create_dir(&packs).expect("create packs dir");
        fs::write(packs.join("broken.yaml"), "not: [valid: yaml").expect("write pack");

        let providers = ProviderLoader::new(base)
            .with_pack_dir(&packs)
            .load_all()
            .expect("load");
        assert_eq!(providers.len(), 1);
    }
}

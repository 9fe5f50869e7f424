//! Read-only repository of loaded domain profiles.
//!
//! Profiles are loaded once, wrapped in `Arc`, and never mutated again.
//! All lookups return `Option`; a miss is an ordinary editing-time query
//! result, not an error.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};

use super::builtin::business_object_profile;
use super::{DomainProfile, NodeType, ProfileId, PropertyType};
use crate::config::ProfileConfig;

#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: Vec<Arc<DomainProfile>>,
    primary: Vec<ProfileId>,
}

impl ProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding only the built-in business-object profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded profile fails validation.
    pub fn with_builtin() -> Result<Self> {
        let mut store = Self::new();
        store.insert(business_object_profile()?)?;
        Ok(store)
    }

    /// Build a store from the `[profiles]` config section.
    ///
    /// Relative paths resolve against `root`. Each entry of `extra_dirs` is
    /// scanned with [`ProfileStore::load_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if any profile file fails to load or validate, if
    /// two profiles share an id, or if a configured primary id is unknown.
    #[instrument(skip(config, extra_dirs), fields(root = %root.display()))]
    pub fn from_config(
        root: &Path,
        config: &ProfileConfig,
        extra_dirs: &[std::path::PathBuf],
    ) -> Result<Self> {
        let mut store = if config.builtin {
            Self::with_builtin()?
        } else {
            Self::new()
        };

        for path in &config.paths {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            };
            store.load_file(&path)?;
        }
        for dir in extra_dirs {
            store.load_dir(dir)?;
        }

        if !config.primary.is_empty() {
            store.set_primary(config.primary.iter().cloned())?;
        }

        info!(profiles = store.len(), "profile store ready");
        Ok(store)
    }

    /// Add a validated profile.
    ///
    /// # Errors
    ///
    /// Returns an error if a profile with the same id is already loaded.
    pub fn insert(&mut self, profile: DomainProfile) -> Result<Arc<DomainProfile>> {
        if self.profile(profile.id().as_str()).is_some() {
            bail!("profile '{}' is already loaded", profile.id());
        }
        debug!(profile = %profile.id(), node_types = profile.node_types().len(), "profile added");
        let profile = Arc::new(profile);
        self.profiles.push(Arc::clone(&profile));
        Ok(profile)
    }

    /// Load one profile definition. The format follows the extension:
    /// `.json`, or `.yaml`/`.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error on unreadable files, unknown extensions, parse
    /// failures, validation failures, or a duplicate profile id.
    pub fn load_file(&mut self, path: &Path) -> Result<Arc<DomainProfile>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let profile: DomainProfile = match extension.as_deref() {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse profile {}", path.display()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse profile {}", path.display()))?,
            _ => bail!(
                "unsupported profile file {} (expected .json, .yaml or .yml)",
                path.display()
            ),
        };

        info!(profile = %profile.id(), path = %path.display(), "loaded profile");
        self.insert(profile)
    }

    /// Load every profile definition directly inside `dir`, in file-name order.
    ///
    /// Files with other extensions are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or any profile
    /// file fails to load.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read profile directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| matches!(e, "json" | "yaml" | "yml"))
            })
            .collect::<Vec<_>>();
        paths.sort();

        for path in &paths {
            self.load_file(path)?;
        }
        Ok(paths.len())
    }

    /// Restrict the primary profiles to `ids`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns an error if any id is not loaded.
    pub fn set_primary(&mut self, ids: impl IntoIterator<Item = ProfileId>) -> Result<()> {
        let ids: Vec<ProfileId> = ids.into_iter().collect();
        for id in &ids {
            if self.profile(id.as_str()).is_none() {
                bail!("primary profile '{id}' is not loaded");
            }
        }
        self.primary = ids;
        Ok(())
    }

    /// Profiles offered to the user. Every loaded profile, unless a primary
    /// list was configured.
    #[must_use]
    pub fn primary_domain_profiles(&self) -> Vec<Arc<DomainProfile>> {
        if self.primary.is_empty() {
            return self.profiles.clone();
        }
        self.primary
            .iter()
            .filter_map(|id| self.profile(id.as_str()))
            .collect()
    }

    #[must_use]
    pub fn profile(&self, id: &str) -> Option<Arc<DomainProfile>> {
        self.profiles
            .iter()
            .find(|p| p.id().as_str() == id)
            .cloned()
    }

    /// First node type with `id` across loaded profiles, in load order.
    #[must_use]
    pub fn find_node_type(&self, id: &str) -> Option<&NodeType> {
        self.profiles.iter().find_map(|p| p.node_type(id))
    }

    /// First property type with `id` across loaded profiles, in load order.
    #[must_use]
    pub fn find_property_type(&self, id: &str) -> Option<&PropertyType> {
        self.profiles.iter().find_map(|p| p.property_type(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::builtin::{BUSINESS_OBJECT_PROFILE_ID, node_types};

    const YAML_PROFILE: &str = r"
id: urn:test:archive
label: Archive
domain_id: urn:test:archive-domain
property_types:
  - id: shelfmark
    label: Shelfmark
    value_type: STRING
node_types:
  - id: Fonds
    label: Fonds
    parent_constraints:
      - matches_none: true
    property_constraints:
      - property_type: shelfmark
        cardinality: { min: 1, max: 1 }
  - id: Box
    label: Box
    parent_constraints:
      - node_types: [Fonds]
    inheritable_properties: [shelfmark]
";

    #[test]
    fn builtin_store_exposes_lookups() {
        let store = ProfileStore::with_builtin().expect("builtin store");
        assert_eq!(store.len(), 1);
        assert!(store.profile(BUSINESS_OBJECT_PROFILE_ID).is_some());
        assert!(store.find_node_type(node_types::DATA_ITEM).is_some());
        assert!(store.find_node_type("Nope").is_none());
        assert!(store.find_property_type("publisher").is_some());
        assert_eq!(store.primary_domain_profiles().len(), 1);
    }

    #[test]
    fn loads_yaml_and_json_by_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("archive.yaml"), YAML_PROFILE).expect("write yaml");
        std::fs::write(dir.path().join("notes.txt"), "not a profile").expect("write txt");

        let mut store = ProfileStore::new();
        let loaded = store.load_dir(dir.path()).expect("load dir");
        assert_eq!(loaded, 1);

        let archive = store.profile("urn:test:archive").expect("archive profile");
        let fonds = archive.node_type("Fonds").expect("fonds");
        assert!(fonds.can_be_root());
        assert_eq!(fonds.profile().as_str(), "urn:test:archive");
    }

    #[test]
    fn duplicate_profile_ids_are_rejected() {
        let mut store = ProfileStore::with_builtin().expect("builtin store");
        let again = business_object_profile().expect("builtin");
        assert!(store.insert(again).is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("archive.xml");
        std::fs::write(&path, "<profile/>").expect("write");
        assert!(ProfileStore::new().load_file(&path).is_err());
    }

    #[test]
    fn primary_list_filters_and_orders() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("archive.yml"), YAML_PROFILE).expect("write yaml");

        let config = ProfileConfig {
            paths: vec!["archive.yml".into()],
            builtin: true,
            primary: vec![ProfileId::new("urn:test:archive")],
        };
        let store = ProfileStore::from_config(dir.path(), &config, &[]).expect("store");
        assert_eq!(store.len(), 2);

        let primary = store.primary_domain_profiles();
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].id().as_str(), "urn:test:archive");

        let mut store = store;
        assert!(store.set_primary([ProfileId::new("urn:missing")]).is_err());
    }
}

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::profile::{ProfileId, StructuralRelation};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub profiles: ProfileConfig,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub inheritance: InheritanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile definition files (`.json`, `.yaml`, `.yml`).
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default = "default_true")]
    pub builtin: bool,
    /// Profiles offered as primary; empty means every loaded profile.
    #[serde(default)]
    pub primary: Vec<ProfileId>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            builtin: default_true(),
            primary: Vec::new(),
        }
    }
}

/// Structural relations whose relationships form the content tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default = "default_relations")]
    pub relations: Vec<StructuralRelation>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            relations: default_relations(),
        }
    }
}

impl HierarchyConfig {
    #[must_use]
    pub fn new(relations: Vec<StructuralRelation>) -> Self {
        Self { relations }
    }

    /// Relation used for new edges when none is known.
    #[must_use]
    pub fn default_relation(&self) -> Option<&StructuralRelation> {
        self.relations.first()
    }

    /// Relation whose child-to-parent predicate is `name`.
    #[must_use]
    pub fn by_child_to_parent(&self, name: &str) -> Option<&StructuralRelation> {
        self.relations.iter().find(|r| r.child_to_parent == name)
    }

    /// Relation whose parent-to-child predicate is `name`.
    #[must_use]
    pub fn by_parent_to_child(&self, name: &str) -> Option<&StructuralRelation> {
        self.relations.iter().find(|r| r.parent_to_child == name)
    }

    /// Whether a relationship called `name` is hierarchical in either direction.
    #[must_use]
    pub fn is_hierarchical(&self, name: &str) -> bool {
        self.by_child_to_parent(name).is_some() || self.by_parent_to_child(name).is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InheritanceConfig {
    /// Treat ignored artifacts like non-inheriting types.
    #[serde(default)]
    pub skip_ignored: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub profile_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub log_format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub log_format: LogFormat,
}

impl EffectiveConfig {
    /// Profile directories from the user config that exist on disk.
    #[must_use]
    pub fn available_profile_dirs(&self) -> Vec<PathBuf> {
        discover_profile_dirs(&self.user)
            .into_iter()
            .filter_map(|(path, available)| available.then_some(path))
            .collect()
    }
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".parcel/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("parcel/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Pair each configured profile directory with whether it exists.
pub fn discover_profile_dirs(config: &UserConfig) -> Vec<(PathBuf, bool)> {
    config
        .profile_dirs
        .iter()
        .map(|path| {
            let available = path.is_dir();
            if !available {
                warn!(path = %path.display(), "configured profile directory does not exist");
            }
            (path.clone(), available)
        })
        .collect()
}

pub fn resolve_config(project_root: &Path, env_format: Option<String>) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;
    let log_format = resolve_log_format(user.log_format.clone(), env_format)?;

    Ok(EffectiveConfig {
        project,
        user,
        log_format,
    })
}

/// Pick the log format: environment first, then user config, then compact.
///
/// An unrecognised environment value is an error; an unrecognised user
/// config value falls through to the default.
pub fn resolve_log_format(
    user_format: Option<String>,
    env_format: Option<String>,
) -> Result<LogFormat> {
    fn normalize(raw: &str) -> Option<LogFormat> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" | "pretty" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    if let Some(raw) = env_format.as_deref() {
        let Some(format) = normalize(raw) else {
            bail!("unknown log format '{raw}' (expected compact or json)");
        };
        return Ok(format);
    }

    if let Some(format) = user_format.as_deref().and_then(normalize) {
        return Ok(format);
    }

    Ok(LogFormat::Compact)
}

const fn default_true() -> bool {
    true
}

fn default_relations() -> Vec<StructuralRelation> {
    vec![StructuralRelation::new("hasMember", "isMemberOf")]
}

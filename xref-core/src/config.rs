//! Startup configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.xrefsync/
//!   config.yaml            (mode 0600)
//!   data/xref-store.json   (identifier + gene tables)
//!   logs/                  (audit logs, summary metrics)
//! ```
//!
//! As in the store module, every function touching the home directory has
//! an `_at(home, …)` form used by tests and a wrapper resolving home with
//! `dirs::home_dir()`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};
use crate::types::{NamespaceKey, SourcePipeline, Species};

pub const DEFAULT_SOURCE_PIPELINE: &str = "RatGTEx";
pub const DEFAULT_NAMESPACE_KEY: NamespaceKey = NamespaceKey(150);

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Scope of the identifiers a run owns and where their source accessions live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub source_pipeline: SourcePipeline,
    pub namespace_key: NamespaceKey,
    #[serde(default = "default_external_namespace")]
    pub external_namespace_key: NamespaceKey,
}

fn default_external_namespace() -> NamespaceKey {
    NamespaceKey::ENSEMBL_GENES
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            source_pipeline: SourcePipeline::from(DEFAULT_SOURCE_PIPELINE),
            namespace_key: DEFAULT_NAMESPACE_KEY,
            external_namespace_key: default_external_namespace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding `xref-store.json`. Relative paths resolve against
    /// the directory of the config file.
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Directory for `inserted.log` / `deleted.log`. When absent, audit
    /// records go to the `inserted` / `deleted` log targets instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_dir: Option<PathBuf>,

    /// JSON-lines file receiving one summary record per species run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_log: Option<PathBuf>,

    #[serde(default)]
    pub rotation: RotationSettings,
}

/// Size-based rotation of the audit files. A log that has reached
/// `max_bytes` when a run opens it moves to `<name>.1`; older copies shift up
/// and anything past `keep` is removed. `keep: 0` discards the full log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSettings {
    #[serde(default = "default_rotation_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_rotation_keep")]
    pub keep: usize,
}

fn default_rotation_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_rotation_keep() -> usize {
    5
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            max_bytes: default_rotation_bytes(),
            keep: default_rotation_keep(),
        }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Banner line printed at the start of every run.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default = "default_species")]
    pub species: Vec<Species>,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_version() -> String {
    format!("xrefsync {}", env!("CARGO_PKG_VERSION"))
}

fn default_species() -> Vec<Species> {
    vec![Species::Rat]
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            import: ImportSettings::default(),
            species: default_species(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Reject configurations a run cannot act on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.import.source_pipeline.0.trim().is_empty() {
            return Err(ConfigError::Invalid("import.source_pipeline is empty".into()));
        }
        if self.import.namespace_key == self.import.external_namespace_key {
            return Err(ConfigError::Invalid(format!(
                "import.namespace_key and import.external_namespace_key are both {}",
                self.import.namespace_key
            )));
        }
        if self.species.is_empty() {
            return Err(ConfigError::Invalid("species list is empty".into()));
        }
        if self.logging.rotation.max_bytes == 0 {
            return Err(ConfigError::Invalid("logging.rotation.max_bytes must be positive".into()));
        }
        Ok(())
    }

    /// Rewrite relative paths so they are anchored at `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.storage.data_dir);
        if let Some(dir) = self.logging.audit_dir.as_mut() {
            anchor(dir);
        }
        if let Some(file) = self.logging.summary_log.as_mut() {
            anchor(file);
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.xrefsync/`
pub fn root_dir_at(home: &Path) -> PathBuf {
    home.join(".xrefsync")
}

/// `<home>/.xrefsync/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    root_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load, resolve and validate the config at an explicit `path`.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io(path, e))?;
    let mut config: SyncConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);
    config.validate()?;
    Ok(config)
}

/// Load `<home>/.xrefsync/config.yaml`.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically save `config` to `path` (`.tmp` sibling, `chmod 0600`, rename).
pub fn save_to(path: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| config_io(dir, e))?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| config_io(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| config_io(path, e))?;
    Ok(())
}

/// Write a default config at `path` unless one already exists.
///
/// Idempotent: an existing file is loaded and returned unchanged unless
/// `force` is set.
pub fn init_config(path: &Path, force: bool) -> Result<SyncConfig, ConfigError> {
    if path.exists() && !force {
        return load_from(path);
    }
    let config = SyncConfig::default();
    save_to(path, &config)?;
    tracing::info!("wrote default config: {}", path.display());
    let mut resolved = config;
    resolved.resolve_paths(path.parent().unwrap_or_else(|| Path::new(".")));
    Ok(resolved)
}

/// Resolve the user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| config_io(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_path_is_correct() {
        let home = TempDir::new().unwrap();
        assert!(config_path_at(home.path()).ends_with(".xrefsync/config.yaml"));
    }

    #[test]
    fn defaults_target_rat_ensembl() {
        let config = SyncConfig::default();
        assert_eq!(config.species, vec![Species::Rat]);
        assert_eq!(config.import.source_pipeline.0, "RatGTEx");
        assert_eq!(config.import.external_namespace_key, NamespaceKey(20));
        config.validate().expect("default config is valid");
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let config: SyncConfig =
            serde_yaml::from_str("import:\n  source_pipeline: GTEx\n  namespace_key: 77\n").unwrap();
        assert_eq!(config.import.namespace_key, NamespaceKey(77));
        assert_eq!(config.import.external_namespace_key, NamespaceKey::ENSEMBL_GENES);
        assert_eq!(config.species, vec![Species::Rat]);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn rotation_defaults_and_partial_override() {
        let config: SyncConfig = serde_yaml::from_str("logging:\n  rotation:\n    keep: 2\n").unwrap();
        assert_eq!(config.logging.rotation.keep, 2);
        assert_eq!(config.logging.rotation.max_bytes, 10 * 1024 * 1024);
        assert_eq!(SyncConfig::default().logging.rotation.keep, 5);

        let mut config = SyncConfig::default();
        config.logging.rotation.max_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let mut config = SyncConfig::default();
        config.logging.audit_dir = Some(PathBuf::from("logs"));
        config.logging.summary_log = Some(PathBuf::from("/var/log/xref.jsonl"));
        config.resolve_paths(Path::new("/etc/xrefsync"));
        assert_eq!(config.storage.data_dir, PathBuf::from("/etc/xrefsync/data"));
        assert_eq!(config.logging.audit_dir, Some(PathBuf::from("/etc/xrefsync/logs")));
        assert_eq!(
            config.logging.summary_log,
            Some(PathBuf::from("/var/log/xref.jsonl"))
        );
    }

    #[test]
    fn validate_rejects_same_namespaces() {
        let mut config = SyncConfig::default();
        config.import.namespace_key = config.import.external_namespace_key;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_empty_species() {
        let mut config = SyncConfig::default();
        config.species.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn save_then_load_roundtrip_resolves_paths() {
        let home = TempDir::new().unwrap();
        let path = config_path_at(home.path());
        save_to(&path, &SyncConfig::default()).unwrap();
        let loaded = load_at(home.path()).unwrap();
        assert_eq!(loaded.storage.data_dir, root_dir_at(home.path()).join("data"));
        assert!(!path.with_extension("yaml.tmp").exists());
    }
}

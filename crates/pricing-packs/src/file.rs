//! # File Rule-Pack Provider
//!
//! Reads packs from a rules directory.
//!
//! ## File Layout
//! ```text
//! rules/
//! ├── v1.0_rules.json     ← tried first
//! ├── v1.1_rules.yaml     ← then .yaml
//! └── v2.0_rules.yml      ← then .yml
//! ```
//!
//! Every `load` hits the disk. Wrap the provider in
//! [`CachedRulePackProvider`](crate::CachedRulePackProvider) to keep
//! compiled packs between runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pricing_core::validation::validate_version;
use pricing_core::{normalize_version, CompiledRulePack, PackLoadError, RulePack, RulePackProvider};
use tracing::{debug, warn};

use crate::error::{PackStoreError, PackStoreResult};

/// File-name suffix shared by every pack file.
pub const RULES_SUFFIX: &str = "_rules";

/// Supported extensions, in lookup order.
pub const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()? {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Loads `<dir>/<version>_rules.{json,yaml,yml}`.
#[derive(Debug, Clone)]
pub struct FileRulePackProvider {
    dir: PathBuf,
}

impl FileRulePackProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileRulePackProvider { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate paths for a version, in lookup order.
    pub fn candidates(&self, version: &str) -> Vec<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}{}.{}", version, RULES_SUFFIX, ext)))
            .collect()
    }

    /// Locates the pack file for a version.
    pub fn locate(&self, version: &str) -> PackStoreResult<PathBuf> {
        validate_version(version)?;
        self.candidates(version)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| PackStoreError::NotFound {
                version: version.to_string(),
                dir: self.dir.clone(),
            })
    }

    /// Reads and parses the raw pack for a version (no compilation).
    pub fn read_pack(&self, version: &str) -> PackStoreResult<RulePack> {
        let path = self.locate(version)?;
        read_pack_file(&path)
    }

    /// Versions with a pack file in the directory, sorted.
    pub fn available_versions(&self) -> PackStoreResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| PackStoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut versions: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| Format::from_path(path).is_some())
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                stem.strip_suffix(RULES_SUFFIX).map(str::to_string)
            })
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }
}

/// Reads one pack file, choosing the parser by extension.
pub fn read_pack_file(path: &Path) -> PackStoreResult<RulePack> {
    let format = Format::from_path(path).ok_or_else(|| PackStoreError::Parse {
        path: path.to_path_buf(),
        reason: "unsupported file extension".to_string(),
    })?;

    let content = fs::read_to_string(path).map_err(|source| PackStoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = match format {
        Format::Json => serde_json::from_str::<RulePack>(&content).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_str::<RulePack>(&content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|reason| PackStoreError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

impl RulePackProvider for FileRulePackProvider {
    fn load(&self, version: &str) -> Result<Arc<CompiledRulePack>, PackLoadError> {
        let raw = self
            .read_pack(version)
            .map_err(|e| e.into_load_error(version))?;

        if normalize_version(&raw.version) != version {
            warn!(
                requested = %version,
                declared = %raw.version,
                "Rule pack declares a different version than its file name"
            );
        }

        let pack = CompiledRulePack::compile(raw)?;
        debug!(version = %version, rules = pack.len(), dir = %self.dir.display(), "Rule pack loaded from disk");
        Ok(Arc::new(pack))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PACK_JSON: &str = r#"{
        "version": "v1.0",
        "description": "json pack",
        "rules": [
            {"id": "vat", "phase": "taxes", "logic": {"*": [{"var": "order.baseValue"}, 0.2]},
             "output_key": "order.appliedTaxes.VAT"}
        ]
    }"#;

    const PACK_YAML: &str = r#"
version: v2.0
description: yaml pack
rules:
  - id: cap
    phase: guards
    logic: {">": [{"var": "order.totalValue"}, 100]}
    error_message: too big
"#;

    fn rules_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("v1.0_rules.json"), PACK_JSON).unwrap();
        fs::write(dir.path().join("v2.0_rules.yaml"), PACK_YAML).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        dir
    }

    #[test]
    fn test_load_json_pack() {
        let dir = rules_dir();
        let provider = FileRulePackProvider::new(dir.path());
        let pack = provider.load("v1.0").unwrap();
        assert_eq!(pack.version, "v1.0");
        assert_eq!(pack.len(), 1);
    }

    #[test]
    fn test_load_yaml_pack() {
        let dir = rules_dir();
        let provider = FileRulePackProvider::new(dir.path());
        let pack = provider.load("v2.0").unwrap();
        assert_eq!(pack.description, "yaml pack");
        assert_eq!(pack.rules()[0].error_message.as_deref(), Some("too big"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = rules_dir();
        let provider = FileRulePackProvider::new(dir.path());
        let err = provider.load("v9.9").unwrap_err();
        assert_eq!(err, PackLoadError::not_found("v9.9"));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("v3.0_rules.json"), "{ not json").unwrap();
        let provider = FileRulePackProvider::new(dir.path());
        assert!(matches!(
            provider.load("v3.0"),
            Err(PackLoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = rules_dir();
        let provider = FileRulePackProvider::new(dir.path());
        assert!(matches!(
            provider.load("../v1.0"),
            Err(PackLoadError::InvalidPack { .. })
        ));
    }

    #[test]
    fn test_available_versions() {
        let dir = rules_dir();
        let provider = FileRulePackProvider::new(dir.path());
        assert_eq!(provider.available_versions().unwrap(), ["v1.0", "v2.0"]);
    }

    #[test]
    fn test_json_preferred_over_yaml() {
        let dir = rules_dir();
        fs::write(
            dir.path().join("v1.0_rules.yml"),
            "version: v1.0\ndescription: shadowed\nrules: []\n",
        )
        .unwrap();
        let provider = FileRulePackProvider::new(dir.path());
        assert_eq!(provider.read_pack("v1.0").unwrap().description, "json pack");
    }
}

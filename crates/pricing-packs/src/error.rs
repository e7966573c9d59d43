//! # Pack Store Error Types
//!
//! Errors raised while reading pack files or using the cross-run stores.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  std::io::Error / serde_json::Error / serde_yaml::Error                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PackStoreError (this module) ← adds path and version context          │
//! │       │                                                                 │
//! │       ├──► PackLoadError (pricing-core) ← what RulePackProvider returns │
//! │       │                                                                 │
//! │       └──► CLI reports it through anyhow                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use pricing_core::{EngineError, PackLoadError, ValidationError};
use thiserror::Error;

/// Errors from pack files, caches and the idempotency store.
#[derive(Debug, Error)]
pub enum PackStoreError {
    /// No file exists for the version under the rules directory.
    #[error("No rule pack for {version} in {}", dir.display())]
    NotFound { version: String, dir: PathBuf },

    /// File exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid pack document.
    ///
    /// ## When This Occurs
    /// - Syntax error in JSON or YAML
    /// - Missing `version` or a rule without `id` / `phase` / `logic`
    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// Requested version is not a safe file-name component.
    #[error("Invalid rules version: {0}")]
    InvalidVersion(#[from] ValidationError),

    /// Parsed pack failed compilation.
    #[error(transparent)]
    Compile(#[from] PackLoadError),

    /// Idempotency key reused with a different request.
    #[error("Idempotency key '{key}' was already used for a different request")]
    IdempotencyConflict { key: String },

    /// Engine run behind the idempotency store failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl PackStoreError {
    /// Maps this error to the core's load error for `version`.
    ///
    /// ## Error Mapping
    /// ```text
    /// NotFound        → PackLoadError::NotFound
    /// Io              → PackLoadError::Io
    /// Parse           → PackLoadError::Parse
    /// InvalidVersion  → PackLoadError::InvalidPack
    /// Compile(e)      → e
    /// other           → PackLoadError::InvalidPack
    /// ```
    pub fn into_load_error(self, version: &str) -> PackLoadError {
        let version = version.to_string();
        match self {
            PackStoreError::NotFound { version, .. } => PackLoadError::NotFound { version },
            PackStoreError::Io { .. } => PackLoadError::Io {
                version,
                reason: self.to_string(),
            },
            PackStoreError::Parse { .. } => PackLoadError::Parse {
                version,
                reason: self.to_string(),
            },
            PackStoreError::Compile(e) => e,
            other => PackLoadError::InvalidPack {
                version,
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for pack store operations.
pub type PackStoreResult<T> = Result<T, PackStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_load_not_found() {
        let err = PackStoreError::NotFound {
            version: "v2.0".to_string(),
            dir: PathBuf::from("rules"),
        };
        assert_eq!(err.to_string(), "No rule pack for v2.0 in rules");
        assert!(err.into_load_error("v2.0").is_not_found());
    }

    #[test]
    fn test_parse_maps_to_load_parse() {
        let err = PackStoreError::Parse {
            path: PathBuf::from("rules/v1.0_rules.json"),
            reason: "expected value at line 1".to_string(),
        };
        assert!(matches!(
            err.into_load_error("v1.0"),
            PackLoadError::Parse { ref version, .. } if version == "v1.0"
        ));
    }
}

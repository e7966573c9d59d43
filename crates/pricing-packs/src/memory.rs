//! # In-Memory Rule-Pack Provider
//!
//! Packs held in process memory, for embedding the engine in services that
//! receive packs from elsewhere, and for tests.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use pricing_core::{normalize_version, CompiledRulePack, PackLoadError, RulePack, RulePackProvider};

/// Provider backed by a version → pack map.
#[derive(Debug, Default)]
pub struct InMemoryRulePackProvider {
    packs: RwLock<HashMap<String, Arc<CompiledRulePack>>>,
}

impl InMemoryRulePackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and stores a pack under its normalized version, replacing
    /// any previous pack of that version.
    pub fn insert(&self, pack: RulePack) -> Result<Arc<CompiledRulePack>, PackLoadError> {
        let compiled = Arc::new(CompiledRulePack::compile(pack)?);
        self.insert_compiled(Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Stores an already compiled pack.
    pub fn insert_compiled(&self, pack: Arc<CompiledRulePack>) {
        let version = normalize_version(&pack.version);
        self.packs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(version, pack);
    }

    /// Removes a version. Returns true if it was present.
    pub fn remove(&self, version: &str) -> bool {
        self.packs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize_version(version))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.packs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RulePackProvider for InMemoryRulePackProvider {
    fn load(&self, version: &str) -> Result<Arc<CompiledRulePack>, PackLoadError> {
        self.packs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(version)
            .cloned()
            .ok_or_else(|| PackLoadError::not_found(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(version: &str) -> RulePack {
        RulePack {
            version: version.to_string(),
            description: String::new(),
            rules: vec![],
        }
    }

    #[test]
    fn test_insert_normalizes_version() {
        let provider = InMemoryRulePackProvider::new();
        provider.insert(pack("1.0")).unwrap();

        assert!(provider.load("v1.0").is_ok());
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn test_missing_version() {
        let provider = InMemoryRulePackProvider::new();
        assert_eq!(
            provider.load("v1.0").unwrap_err(),
            PackLoadError::not_found("v1.0")
        );
    }

    #[test]
    fn test_invalid_pack_rejected() {
        let provider = InMemoryRulePackProvider::new();
        assert!(provider.insert(pack("")).is_err());
        assert!(provider.is_empty());
    }

    #[test]
    fn test_remove() {
        let provider = InMemoryRulePackProvider::new();
        provider.insert(pack("v1.0")).unwrap();
        assert!(provider.remove("1.0"));
        assert!(provider.is_empty());
    }
}

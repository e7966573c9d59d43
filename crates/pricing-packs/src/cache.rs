//! # Rule-Pack Cache
//!
//! Read-mostly cache of compiled packs in front of any provider.
//!
//! ## Lookup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load("v1.0")                                                           │
//! │     │                                                                   │
//! │     ├── read lock ── hit ──────────────────────────► Arc (shared)       │
//! │     │                                                           ▲       │
//! │     └── miss ── inner.load("v1.0")  (no lock held)              │       │
//! │                    │                                            │       │
//! │                    ├── Err ──► returned, nothing cached         │       │
//! │                    └── Ok  ──► write lock, check again ─────────┘       │
//! │                                (first insert wins)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two runs racing on a cold version may both hit the inner provider, but
//! both end up holding the same `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use pricing_core::{CompiledRulePack, PackLoadError, RulePackProvider};
use tracing::{debug, info};

/// Caches compiled packs from an inner provider.
#[derive(Debug)]
pub struct CachedRulePackProvider<P> {
    inner: P,
    packs: RwLock<HashMap<String, Arc<CompiledRulePack>>>,
}

impl<P: RulePackProvider> CachedRulePackProvider<P> {
    pub fn new(inner: P) -> Self {
        CachedRulePackProvider {
            inner,
            packs: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Drops one version. Returns true if it was cached.
    pub fn invalidate(&self, version: &str) -> bool {
        let removed = self
            .packs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(version)
            .is_some();
        if removed {
            info!(version = %version, "Rule pack evicted from cache");
        }
        removed
    }

    /// Drops every cached pack.
    pub fn clear(&self) {
        self.packs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Cached versions, sorted.
    pub fn cached_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self
            .packs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        versions.sort();
        versions
    }

    pub fn is_cached(&self, version: &str) -> bool {
        self.packs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(version)
    }
}

impl<P: RulePackProvider> RulePackProvider for CachedRulePackProvider<P> {
    fn load(&self, version: &str) -> Result<Arc<CompiledRulePack>, PackLoadError> {
        if let Some(pack) = self
            .packs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(version)
        {
            return Ok(Arc::clone(pack));
        }

        let loaded = self.inner.load(version)?;

        let mut packs = self.packs.write().unwrap_or_else(PoisonError::into_inner);
        let pack = packs
            .entry(version.to_string())
            .or_insert_with(|| {
                debug!(version = %version, "Rule pack cached");
                loaded
            })
            .clone();
        Ok(pack)
    }
}

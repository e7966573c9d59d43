//! # Idempotency Store
//!
//! Remembers the result of an engine run under a caller-chosen key, so a
//! retried request gets the exact same `EngineResult` instead of a rerun.
//!
//! ## Key Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  run(key, engine, ctx, order, version)                                  │
//! │     │                                                                   │
//! │     ├── key stored, same order + version   → stored result (replay)     │
//! │     ├── key stored, different request      → IdempotencyConflict        │
//! │     ├── key stored but expired             → treated as absent          │
//! │     └── key absent → engine.run_engine(..)                              │
//! │                        ├── Err → returned, nothing stored               │
//! │                        └── Ok  → stored (first writer wins), returned   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A store from [`IdempotencyStore::new`] keeps every key forever. Long-lived
//! callers should set a TTL, a capacity, or both. At capacity, expired
//! entries go first, then the oldest entry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use pricing_core::{normalize_version, Engine, EngineResult, Order, RulePackProvider, RunContext};
use tracing::{debug, info};

use crate::error::{PackStoreError, PackStoreResult};

/// One remembered run.
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyEntry {
    pub order: Order,
    pub rules_version: String,
    pub result: EngineResult,
    pub stored_at: DateTime<Utc>,
}

impl IdempotencyEntry {
    fn matches(&self, order: &Order, rules_version: &str) -> bool {
        self.rules_version == rules_version && &self.order == order
    }
}

/// Key → result store guarded by an `RwLock`.
#[derive(Debug, Default)]
pub struct IdempotencyStore {
    entries: RwLock<HashMap<String, IdempotencyEntry>>,
    ttl: Option<Duration>,
    capacity: Option<usize>,
}

impl IdempotencyStore {
    /// Unbounded store whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose entries expire `ttl` after they were written.
    pub fn with_ttl(ttl: Duration) -> Self {
        IdempotencyStore {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Caps the number of stored keys (at least one).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    fn is_live(&self, entry: &IdempotencyEntry, now: DateTime<Utc>) -> bool {
        self.ttl.map_or(true, |ttl| now - entry.stored_at < ttl)
    }

    /// Stored result for a key, if present and not expired.
    pub fn get(&self, key: &str) -> Option<EngineResult> {
        let now = Utc::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.result.clone())
    }

    /// Runs the engine once per key.
    ///
    /// ## Errors
    /// - `IdempotencyConflict` when the key was used for another request
    /// - `Engine` when the run itself fails (nothing is stored)
    pub fn run<P: RulePackProvider>(
        &self,
        key: &str,
        engine: &Engine<P>,
        ctx: &RunContext,
        order: &Order,
        rules_version: &str,
    ) -> PackStoreResult<EngineResult> {
        let version = normalize_version(rules_version);

        if let Some(stored) = self.lookup(key, order, &version)? {
            debug!(key = %key, "Idempotent replay");
            return Ok(stored);
        }

        let result = engine.run_engine(ctx, order, &version)?;

        let now = Utc::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(key).filter(|e| self.is_live(e, now)) {
            // Another caller finished first with this key.
            return if existing.matches(order, &version) {
                Ok(existing.result.clone())
            } else {
                Err(PackStoreError::IdempotencyConflict {
                    key: key.to_string(),
                })
            };
        }

        if let Some(capacity) = self.capacity {
            self.make_room(&mut entries, capacity, now);
        }
        entries.insert(
            key.to_string(),
            IdempotencyEntry {
                order: order.clone(),
                rules_version: version,
                result: result.clone(),
                stored_at: now,
            },
        );
        Ok(result)
    }

    fn lookup(
        &self,
        key: &str,
        order: &Order,
        version: &str,
    ) -> PackStoreResult<Option<EngineResult>> {
        let now = Utc::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key).filter(|e| self.is_live(e, now)) {
            Some(entry) if entry.matches(order, version) => Ok(Some(entry.result.clone())),
            Some(_) => Err(PackStoreError::IdempotencyConflict {
                key: key.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Evicts until a new key fits: expired entries first, then the oldest.
    fn make_room(
        &self,
        entries: &mut HashMap<String, IdempotencyEntry>,
        capacity: usize,
        now: DateTime<Utc>,
    ) {
        if entries.len() < capacity {
            return;
        }
        entries.retain(|_, entry| self.is_live(entry, now));
        while entries.len() >= capacity {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            debug!(key = %oldest, "Evicting idempotency entry at capacity");
            entries.remove(&oldest);
        }
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            info!(removed, "Purged expired idempotency entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

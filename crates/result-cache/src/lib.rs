//! Identity-scoped memoization of query artifacts.
//!
//! The cache is a per-identity memo, not a shared resource: the owning
//! identity is part of the lookup key on every operation, and the API has
//! no credential parameter, so no privilege level can read another
//! identity's entries. Two identities asking semantically identical
//! questions never see each other's results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache writes must carry an owning identity")]
    MissingIdentity,
}

/// A memoized payload owned by one identity.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    pub hit_count: u64,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => self.created_at + ttl <= Utc::now(),
            Err(_) => false,
        }
    }
}

/// Identity-scoped read/write gateway over a concurrent map.
///
/// Consistency is per key; concurrent writers to distinct identities never
/// contend.
pub struct CacheGateway {
    entries: DashMap<(String, String), CacheEntry>,
}

impl Default for CacheGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheGateway {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store a payload under `(identity, key)`. A write without an owning
    /// identity fails loudly rather than degrading to an unscoped write.
    pub fn write(
        &self,
        identity: &str,
        key: &str,
        payload: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if identity.trim().is_empty() {
            return Err(CacheError::MissingIdentity);
        }

        self.entries.insert(
            (identity.to_string(), key.to_string()),
            CacheEntry {
                payload,
                created_at: Utc::now(),
                ttl,
                hit_count: 0,
            },
        );
        Ok(())
    }

    /// Look up a payload for this identity. Expired entries are misses and
    /// are evicted on the way out.
    pub fn read(&self, identity: &str, key: &str) -> Option<serde_json::Value> {
        let map_key = (identity.to_string(), key.to_string());

        let expired = match self.entries.get_mut(&map_key) {
            Some(mut entry) => {
                if entry.is_expired() {
                    true
                } else {
                    entry.hit_count += 1;
                    debug!(identity, key, hits = entry.hit_count, "Cache hit");
                    return Some(entry.payload.clone());
                }
            }
            None => return None,
        };

        if expired {
            self.entries.remove(&map_key);
        }
        None
    }

    pub fn hit_count(&self, identity: &str, key: &str) -> u64 {
        self.entries
            .get(&(identity.to_string(), key.to_string()))
            .map(|entry| entry.hit_count)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

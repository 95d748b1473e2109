use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, instrument, warn};

use common::env_const::get_permission_ttl_secs;
use loupe_env::Environment;

use crate::grants::{GrantStore, PermissionBundle};

/// Grace window multiplier: a stale bundle may still be served for this many
/// TTLs when the backend is down, after which resolution fails closed.
const GRACE_TTLS: u32 = 3;

/// Hydrates and caches [`PermissionBundle`]s per subject.
///
/// The cache is a concurrent map with per-key consistency: concurrent
/// resolutions for one subject may duplicate backend work, but the map is
/// never corrupted and callers are never blocked on each other's refresh.
pub struct PermissionResolver {
    store: Arc<dyn GrantStore>,
    cache: DashMap<String, Arc<PermissionBundle>>,
    ttl: Duration,
    hydrations: AtomicU64,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn GrantStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            ttl,
            hydrations: AtomicU64::new(0),
        }
    }

    pub fn new_from_env(
        store: Arc<dyn GrantStore>,
        env: &dyn Environment,
    ) -> Result<Self, loupe_env::EnvError> {
        let ttl = Duration::from_secs(get_permission_ttl_secs(env)?);
        Ok(Self::new(store, ttl))
    }

    /// Resolve the bundle for a subject, serving from cache within the TTL.
    ///
    /// On backend failure a still-cached bundle is served while it is within
    /// the grace window; otherwise the empty (fail-closed) bundle is
    /// returned. Never errors: an unresolvable subject simply has no access.
    #[instrument(skip(self))]
    pub async fn resolve(&self, subject: &str) -> Arc<PermissionBundle> {
        // The map guard must not be held across the hydration await.
        let cached = self.cache.get(subject).map(|entry| entry.value().clone());

        if let Some(bundle) = &cached {
            if self.age_of(bundle) <= self.ttl {
                debug!(subject, "Serving permissions from cache");
                return bundle.clone();
            }
        }

        match self.hydrate(subject).await {
            Some(bundle) => {
                self.cache.insert(subject.to_string(), bundle.clone());
                bundle
            }
            None => {
                if let Some(bundle) = cached {
                    if self.age_of(&bundle) <= self.ttl * GRACE_TTLS {
                        warn!(subject, "Permission backend down; serving stale bundle");
                        return bundle;
                    }
                }
                warn!(subject, "Permission backend down and no usable cache; failing closed");
                Arc::new(PermissionBundle::empty())
            }
        }
    }

    async fn hydrate(&self, subject: &str) -> Option<Arc<PermissionBundle>> {
        self.hydrations.fetch_add(1, Ordering::Relaxed);

        let result = async {
            let role_ids = self.store.role_ids(subject).await?;
            let permissions = self.store.permissions(&role_ids).await?;
            let grants = self.store.grants(&role_ids).await?;
            Ok::<_, crate::grants::GrantStoreError>(PermissionBundle::from_parts(
                permissions,
                grants,
            ))
        }
        .await;

        match result {
            Ok(bundle) => Some(Arc::new(bundle)),
            Err(error) => {
                warn!(subject, %error, "Permission hydration failed");
                None
            }
        }
    }

    fn age_of(&self, bundle: &PermissionBundle) -> Duration {
        (Utc::now() - bundle.resolved_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Number of backend hydrations performed. Used by tests to assert that
    /// the TTL cache actually short-circuits lookups.
    pub fn hydration_count(&self) -> u64 {
        self.hydrations.load(Ordering::Relaxed)
    }

    /// Drop the cached bundle for a subject, forcing the next resolution to
    /// hydrate.
    pub fn invalidate(&self, subject: &str) {
        self.cache.remove(subject);
    }

    #[cfg(test)]
    fn seed(&self, subject: &str, bundle: PermissionBundle) {
        self.cache.insert(subject.to_string(), Arc::new(bundle));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;

    use crate::grants::{AccessLevel, GrantStoreError, ResourceGrant};

    use super::*;

    struct FakeGrantStore {
        fail: AtomicBool,
    }

    impl FakeGrantStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fail: AtomicBool::new(false),
            })
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), GrantStoreError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(GrantStoreError::Unavailable("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl GrantStore for FakeGrantStore {
        async fn role_ids(&self, _subject: &str) -> Result<Vec<String>, GrantStoreError> {
            self.check()?;
            Ok(vec!["analyst".to_string()])
        }

        async fn permissions(&self, _role_ids: &[String]) -> Result<Vec<String>, GrantStoreError> {
            self.check()?;
            Ok(vec!["query:execute".to_string()])
        }

        async fn grants(&self, _role_ids: &[String]) -> Result<Vec<ResourceGrant>, GrantStoreError> {
            self.check()?;
            Ok(vec![ResourceGrant {
                role_id: "analyst".to_string(),
                dataset_id: "sales".to_string(),
                table_id: "orders".to_string(),
                access_level: AccessLevel::Read,
            }])
        }
    }

    #[tokio::test]
    async fn second_resolution_within_ttl_is_cached() {
        let store = FakeGrantStore::new();
        let resolver = PermissionResolver::new(store, Duration::from_secs(300));

        let first = resolver.resolve("user-1").await;
        let second = resolver.resolve("user-1").await;

        assert_eq!(first, second);
        assert_eq!(resolver.hydration_count(), 1);
    }

    #[tokio::test]
    async fn distinct_subjects_hydrate_separately() {
        let store = FakeGrantStore::new();
        let resolver = PermissionResolver::new(store, Duration::from_secs(300));

        resolver.resolve("user-1").await;
        resolver.resolve("user-2").await;

        assert_eq!(resolver.hydration_count(), 2);
    }

    #[tokio::test]
    async fn backend_failure_without_cache_fails_closed() {
        let store = FakeGrantStore::new();
        store.set_failing(true);
        let resolver = PermissionResolver::new(store.clone(), Duration::from_secs(300));

        let bundle = resolver.resolve("user-1").await;

        assert!(bundle.permissions.is_empty());
        assert!(bundle.datasets.is_empty());
    }

    fn aged_bundle(age: Duration) -> PermissionBundle {
        let mut bundle = PermissionBundle::from_parts(
            vec!["query:execute".to_string()],
            vec![ResourceGrant {
                role_id: "analyst".to_string(),
                dataset_id: "sales".to_string(),
                table_id: "orders".to_string(),
                access_level: AccessLevel::Read,
            }],
        );
        bundle.resolved_at = Utc::now() - chrono::Duration::from_std(age).unwrap();
        bundle
    }

    #[tokio::test]
    async fn backend_failure_serves_stale_bundle_within_grace() {
        let store = FakeGrantStore::new();
        store.set_failing(true);
        let ttl = Duration::from_secs(300);
        let resolver = PermissionResolver::new(store, ttl);

        // Expired for normal serving, but inside the grace window.
        resolver.seed("user-1", aged_bundle(ttl * 2));

        let bundle = resolver.resolve("user-1").await;
        assert!(bundle.permissions.contains("query:execute"));
    }

    #[tokio::test]
    async fn backend_failure_past_grace_fails_closed() {
        let store = FakeGrantStore::new();
        store.set_failing(true);
        let ttl = Duration::from_secs(300);
        let resolver = PermissionResolver::new(store, ttl);

        resolver.seed("user-1", aged_bundle(ttl * 4));

        let bundle = resolver.resolve("user-1").await;
        assert!(bundle.permissions.is_empty());
    }

    #[tokio::test]
    async fn invalidation_forces_rehydration() {
        let store = FakeGrantStore::new();
        let resolver = PermissionResolver::new(store, Duration::from_secs(300));

        resolver.resolve("user-1").await;
        resolver.invalidate("user-1");
        resolver.resolve("user-1").await;

        assert_eq!(resolver.hydration_count(), 2);
    }
}

//! Per-identity, per-period consumption tracking and admission control.
//!
//! Quota gates the text-generation call. Unlike authorization, a store
//! outage here fails open: availability of the answer loop outranks strict
//! metering during a transient backend outage.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use common::env_const::{get_quota_daily_limit, get_quota_monthly_limit};
use loupe_env::Environment;

/// The window over which consumption is measured. Boundaries are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Monthly,
}

impl Period {
    /// The storage key for the current window, e.g. `2026-08-23` or
    /// `2026-08`. Counters reset at period boundaries because the key
    /// changes.
    pub fn current_key(&self) -> String {
        let now = Utc::now();
        match self {
            Period::Daily => format!("{:04}-{:02}-{:02}", now.year(), now.month(), now.day()),
            Period::Monthly => format!("{:04}-{:02}", now.year(), now.month()),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Daily => write!(f, "daily"),
            Period::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Error)]
pub enum QuotaStoreError {
    #[error("Quota backend unavailable: {0}")]
    Unavailable(String),
}

/// Backend counter store, keyed by subject and period key.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn consumed(&self, subject: &str, period_key: &str) -> Result<u64, QuotaStoreError>;

    async fn record(
        &self,
        subject: &str,
        period_key: &str,
        tokens: u64,
    ) -> Result<(), QuotaStoreError>;
}

/// The quota-exceeded result: carries everything the caller needs to act.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaExceeded {
    pub period: Period,
    pub limit: u64,
    pub consumed: u64,
}

impl QuotaExceeded {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }
}

/// Admission control against configured daily and monthly limits.
pub struct QuotaGuard {
    store: Arc<dyn QuotaStore>,
    daily_limit: u64,
    monthly_limit: u64,
}

impl QuotaGuard {
    pub fn new(store: Arc<dyn QuotaStore>, daily_limit: u64, monthly_limit: u64) -> Self {
        Self {
            store,
            daily_limit,
            monthly_limit,
        }
    }

    pub fn new_from_env(
        store: Arc<dyn QuotaStore>,
        env: &dyn Environment,
    ) -> Result<Self, loupe_env::EnvError> {
        Ok(Self::new(
            store,
            get_quota_daily_limit(env)?,
            get_quota_monthly_limit(env)?,
        ))
    }

    /// Admit or reject an operation with the given estimated cost.
    ///
    /// A request is admitted while `consumed + cost <= limit` for every
    /// period. If the store cannot be reached the request is admitted with
    /// a warning (fail open).
    pub async fn admit(&self, subject: &str, cost: u64) -> Result<(), QuotaExceeded> {
        for (period, limit) in [
            (Period::Daily, self.daily_limit),
            (Period::Monthly, self.monthly_limit),
        ] {
            let consumed = match self.store.consumed(subject, &period.current_key()).await {
                Ok(consumed) => consumed,
                Err(error) => {
                    warn!(subject, %period, %error, "Quota check unavailable; admitting");
                    continue;
                }
            };

            if consumed + cost > limit {
                debug!(subject, %period, consumed, limit, "Quota exceeded");
                return Err(QuotaExceeded {
                    period,
                    limit,
                    consumed,
                });
            }
        }

        Ok(())
    }

    /// Record consumption after the metered operation ran. A store failure
    /// is logged and swallowed, consistent with fail-open admission.
    pub async fn record(&self, subject: &str, cost: u64) {
        for period in [Period::Daily, Period::Monthly] {
            if let Err(error) = self
                .store
                .record(subject, &period.current_key(), cost)
                .await
            {
                warn!(subject, %period, %error, "Failed to record quota consumption");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use dashmap::DashMap;

    use super::*;

    struct InMemoryQuotaStore {
        counters: DashMap<(String, String), u64>,
        fail: AtomicBool,
    }

    impl InMemoryQuotaStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                counters: DashMap::new(),
                fail: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl QuotaStore for InMemoryQuotaStore {
        async fn consumed(&self, subject: &str, period_key: &str) -> Result<u64, QuotaStoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(QuotaStoreError::Unavailable("timeout".into()));
            }
            Ok(self
                .counters
                .get(&(subject.to_string(), period_key.to_string()))
                .map(|v| *v)
                .unwrap_or(0))
        }

        async fn record(
            &self,
            subject: &str,
            period_key: &str,
            tokens: u64,
        ) -> Result<(), QuotaStoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(QuotaStoreError::Unavailable("timeout".into()));
            }
            *self
                .counters
                .entry((subject.to_string(), period_key.to_string()))
                .or_insert(0) += tokens;
            Ok(())
        }
    }

    #[tokio::test]
    async fn admits_up_to_the_limit_then_rejects() {
        let store = InMemoryQuotaStore::new();
        let guard = QuotaGuard::new(store.clone(), 10, 1_000);

        // Bring consumption to limit - 1.
        guard.record("user-1", 9).await;

        // A request that lands exactly on the limit is admitted...
        assert!(guard.admit("user-1", 1).await.is_ok());
        guard.record("user-1", 1).await;

        // ...and the next positive-cost request is rejected with zero
        // remaining.
        let exceeded = guard.admit("user-1", 1).await.unwrap_err();
        assert_eq!(exceeded.period, Period::Daily);
        assert_eq!(exceeded.limit, 10);
        assert_eq!(exceeded.consumed, 10);
        assert_eq!(exceeded.remaining(), 0);
    }

    #[tokio::test]
    async fn monthly_limit_checked_independently() {
        let store = InMemoryQuotaStore::new();
        let guard = QuotaGuard::new(store.clone(), 1_000, 10);

        guard.record("user-1", 10).await;

        let exceeded = guard.admit("user-1", 1).await.unwrap_err();
        assert_eq!(exceeded.period, Period::Monthly);
    }

    #[tokio::test]
    async fn quotas_are_per_subject() {
        let store = InMemoryQuotaStore::new();
        let guard = QuotaGuard::new(store.clone(), 10, 1_000);

        guard.record("user-1", 10).await;

        assert!(guard.admit("user-1", 1).await.is_err());
        assert!(guard.admit("user-2", 1).await.is_ok());
    }

    #[tokio::test]
    async fn store_outage_fails_open() {
        let store = InMemoryQuotaStore::new();
        let guard = QuotaGuard::new(store.clone(), 0, 0);

        store.fail.store(true, Ordering::SeqCst);

        // Even a zero limit admits when the store cannot be consulted.
        assert!(guard.admit("user-1", 100).await.is_ok());
    }
}

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use common::normalize_ident;

pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Read,
    Admin,
}

/// A role-to-resource mapping as stored by administrators. Dataset and
/// table may be the `*` wildcard.
#[derive(Debug, Clone)]
pub struct ResourceGrant {
    pub role_id: String,
    pub dataset_id: String,
    pub table_id: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Error)]
pub enum GrantStoreError {
    #[error("Permission backend unavailable: {0}")]
    Unavailable(String),
}

/// Backend store for role assignments, role permissions, and resource
/// grants. Implementations own their transport; the resolver only merges.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn role_ids(&self, subject: &str) -> Result<Vec<String>, GrantStoreError>;

    async fn permissions(&self, role_ids: &[String]) -> Result<Vec<String>, GrantStoreError>;

    async fn grants(&self, role_ids: &[String]) -> Result<Vec<ResourceGrant>, GrantStoreError>;
}

/// Merged authorization data for one subject. Immutable once built; the
/// resolver replaces whole bundles, never mutates them in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionBundle {
    pub permissions: HashSet<String>,
    pub datasets: HashSet<String>,
    pub tables: HashMap<String, HashSet<String>>,
    pub resolved_at: DateTime<Utc>,
}

impl PermissionBundle {
    /// The fail-closed value: grants nothing.
    pub fn empty() -> Self {
        Self {
            permissions: HashSet::new(),
            datasets: HashSet::new(),
            tables: HashMap::new(),
            resolved_at: Utc::now(),
        }
    }

    pub fn from_parts(permissions: Vec<String>, grants: Vec<ResourceGrant>) -> Self {
        let mut datasets = HashSet::new();
        let mut tables: HashMap<String, HashSet<String>> = HashMap::new();

        for grant in grants {
            let dataset = normalize_ident(&grant.dataset_id);
            let table = normalize_ident(&grant.table_id);
            datasets.insert(dataset.clone());
            tables.entry(dataset).or_default().insert(table);
        }

        Self {
            permissions: permissions.into_iter().collect(),
            datasets,
            tables,
            resolved_at: Utc::now(),
        }
    }
}

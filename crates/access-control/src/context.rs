use std::sync::Arc;

use common::{Identity, normalize_ident};

use crate::grants::{PermissionBundle, WILDCARD};

/// Immutable snapshot of an identity's resolved authorization state.
///
/// Built once per request from the validated identity and its permission
/// bundle; expiry is inherited from the token. Rebuilt, never mutated.
#[derive(Debug, Clone)]
pub struct AccessContext {
    identity: Identity,
    bundle: Arc<PermissionBundle>,
}

impl AccessContext {
    pub fn new(identity: Identity, bundle: Arc<PermissionBundle>) -> Self {
        Self { identity, bundle }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn subject(&self) -> &str {
        self.identity.subject()
    }

    pub fn is_expired(&self) -> bool {
        self.identity.is_expired()
    }

    pub fn has_permission(&self, tag: &str) -> bool {
        self.bundle.permissions.contains(tag)
    }

    pub fn can_access_dataset(&self, dataset: &str) -> bool {
        let dataset = normalize_ident(dataset);
        self.bundle.datasets.contains(WILDCARD) || self.bundle.datasets.contains(&dataset)
    }

    pub fn can_access_table(&self, dataset: &str, table: &str) -> bool {
        if !self.can_access_dataset(dataset) {
            return false;
        }

        let dataset = normalize_ident(dataset);
        let table = normalize_ident(table);

        // Exact-dataset and wildcard-dataset grants both apply: a table
        // granted under `*` is allowed in every dataset.
        [
            self.bundle.tables.get(&dataset),
            self.bundle.tables.get(WILDCARD),
        ]
        .into_iter()
        .flatten()
        .any(|tables| tables.contains(WILDCARD) || tables.contains(&table))
    }

    /// The datasets this identity may query, for user-facing remediation.
    /// Never includes anything outside the identity's own grants.
    pub fn authorized_datasets(&self) -> Vec<String> {
        let mut datasets: Vec<String> = self.bundle.datasets.iter().cloned().collect();
        datasets.sort();
        datasets
    }

    /// The `dataset.table` pairs this identity may query, sorted for stable
    /// messages.
    pub fn authorized_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .bundle
            .tables
            .iter()
            .flat_map(|(dataset, tables)| {
                tables.iter().map(move |table| format!("{dataset}.{table}"))
            })
            .collect();
        tables.sort();
        tables
    }
}

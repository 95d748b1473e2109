use std::fmt;

use common::normalize_ident;

/// One table mention extracted from SQL text: a `(project, dataset, table)`
/// triple. Components are stored normalized (unquoted, lowercased).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableReference {
    pub project: Option<String>,
    pub dataset: String,
    pub table: String,
}

impl TableReference {
    pub fn new(project: Option<&str>, dataset: &str, table: &str) -> Self {
        Self {
            project: project.map(normalize_ident),
            dataset: normalize_ident(dataset),
            table: normalize_ident(table),
        }
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{}.{}.{}", project, self.dataset, self.table),
            None => write!(f, "{}.{}", self.dataset, self.table),
        }
    }
}

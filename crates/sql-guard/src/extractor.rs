use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;

use common::env_const::get_default_project;
use loupe_env::Environment;

use crate::TableReference;

const SEGMENT: &str = r#"`[^`]+`|"[^"]+"|[A-Za-z_][A-Za-z0-9_$-]*"#;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(
        "Unqualified table name `{0}`. Qualify every table as `dataset.table` or `project.dataset.table`"
    )]
    UnqualifiedTable(String),

    #[error("Malformed table reference `{0}`")]
    MalformedReference(String),
}

/// Lexically scans FROM/JOIN clauses for table references.
///
/// Supports `project.dataset.table` and `dataset.table` forms (the project
/// then defaults to the configured one, if any). A bare table name is
/// rejected rather than assumed to live in a default dataset, so the
/// authorized surface of a statement is always explicit in its text.
pub struct ReferenceExtractor {
    default_project: Option<String>,
    clause: Regex,
    list_sep: Regex,
    path: Regex,
    segment: Regex,
}

impl ReferenceExtractor {
    pub fn new(default_project: Option<String>) -> Self {
        let path = format!(r"(?:{SEGMENT})(?:\s*\.\s*(?:{SEGMENT}))*");
        Self {
            default_project: default_project.as_deref().map(common::normalize_ident),
            clause: Regex::new(&format!(r"(?i)\b(?:from|join)\s+({path})"))
                .unwrap_or_else(|e| panic!("invalid clause pattern: {e}")),
            // an optional alias, then the comma continuing a FROM list
            list_sep: Regex::new(r"^\s*(?:(?i:as)\s+)?(?:[A-Za-z_][A-Za-z0-9_]*\s*)?,\s*")
                .unwrap_or_else(|e| panic!("invalid separator pattern: {e}")),
            path: Regex::new(&format!(r"^{path}"))
                .unwrap_or_else(|e| panic!("invalid path pattern: {e}")),
            segment: Regex::new(SEGMENT).unwrap_or_else(|e| panic!("invalid segment pattern: {e}")),
        }
    }

    pub fn new_from_env(env: &dyn Environment) -> Self {
        Self::new(get_default_project(env))
    }

    /// Produce the ordered, de-duplicated list of table references in the
    /// statement. Pure function of the input text.
    pub fn extract(&self, sql: &str) -> Result<Vec<TableReference>, ExtractionError> {
        let mut seen = HashSet::new();
        let mut references = Vec::new();

        for capture in self.clause.captures_iter(sql) {
            let Some(first) = capture.get(1) else { continue };

            // A FROM clause may list tables comma-separated (an implicit
            // cross join); walk the whole list past optional aliases.
            let mut paths = vec![(first.as_str().to_string(), first.end())];
            let mut cursor = skip_call_arguments(sql, first.end());
            while let Some(sep) = self.list_sep.find(&sql[cursor..]) {
                let start = cursor + sep.end();
                let Some(path) = self.path.find(&sql[start..]) else { break };
                let end = start + path.end();
                paths.push((path.as_str().to_string(), end));
                cursor = skip_call_arguments(sql, end);
            }

            for (path, end) in paths {
                // A path immediately followed by `(` is a call (e.g.
                // UNNEST), not a table.
                if sql[end..].trim_start().starts_with('(') {
                    continue;
                }

                let reference = self.parse_path(&path)?;
                if seen.insert(reference.clone()) {
                    references.push(reference);
                }
            }
        }

        Ok(references)
    }

    fn parse_path(&self, path: &str) -> Result<TableReference, ExtractionError> {
        let mut segments: Vec<String> = self
            .segment
            .find_iter(path)
            .map(|m| m.as_str().to_string())
            .collect();

        // A single backticked segment may itself carry a dotted path
        // (`project.dataset.table`).
        if segments.len() == 1 && segments[0].starts_with('`') && segments[0].contains('.') {
            let inner = segments[0].trim_matches('`').to_string();
            segments = inner.split('.').map(|s| s.to_string()).collect();
        }

        match segments.len() {
            0 => Err(ExtractionError::MalformedReference(path.to_string())),
            1 => Err(ExtractionError::UnqualifiedTable(
                common::normalize_ident(&segments[0]),
            )),
            2 => Ok(TableReference {
                project: self.default_project.clone(),
                dataset: common::normalize_ident(&segments[0]),
                table: common::normalize_ident(&segments[1]),
            }),
            3 => Ok(TableReference::new(
                Some(&segments[0]),
                &segments[1],
                &segments[2],
            )),
            _ => Err(ExtractionError::MalformedReference(path.to_string())),
        }
    }
}

/// Advance past a call argument list so the list walker can keep scanning
/// the remainder of a comma-separated FROM list.
fn skip_call_arguments(sql: &str, end: usize) -> usize {
    let rest = &sql[end..];
    let trimmed = rest.trim_start();
    if !trimmed.starts_with('(') {
        return end;
    }

    let open = end + (rest.len() - trimmed.len());
    let mut depth = 0usize;
    for (i, c) in sql[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return open + i + 1;
                }
            }
            _ => {}
        }
    }
    sql.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ReferenceExtractor {
        ReferenceExtractor::new(None)
    }

    #[test]
    fn fully_and_dataset_qualified_join() {
        let refs = extractor()
            .extract("SELECT * FROM proj.ds.tbl a JOIN ds2.tbl2 b ON a.id = b.id")
            .unwrap();

        assert_eq!(
            refs,
            vec![
                TableReference::new(Some("proj"), "ds", "tbl"),
                TableReference::new(None, "ds2", "tbl2"),
            ]
        );
    }

    #[test]
    fn default_project_applied_to_dataset_qualified() {
        let refs = ReferenceExtractor::new(Some("Analytics-Prod".to_string()))
            .extract("SELECT 1 FROM sales.orders")
            .unwrap();

        assert_eq!(
            refs,
            vec![TableReference::new(Some("analytics-prod"), "sales", "orders")]
        );
    }

    #[test]
    fn deduplicates_in_first_seen_order() {
        let refs = extractor()
            .extract(
                "SELECT * FROM sales.orders o \
                 JOIN marketing.campaigns c ON o.cid = c.id \
                 JOIN sales.orders o2 ON o.id = o2.id",
            )
            .unwrap();

        assert_eq!(
            refs,
            vec![
                TableReference::new(None, "sales", "orders"),
                TableReference::new(None, "marketing", "campaigns"),
            ]
        );
    }

    #[test]
    fn comma_separated_from_list() {
        let refs = extractor()
            .extract("SELECT * FROM sales.orders, marketing.campaigns")
            .unwrap();

        assert_eq!(
            refs,
            vec![
                TableReference::new(None, "sales", "orders"),
                TableReference::new(None, "marketing", "campaigns"),
            ]
        );
    }

    #[test]
    fn comma_list_with_aliases_and_trailing_join() {
        let refs = extractor()
            .extract(
                "SELECT * FROM sales.orders o, crm.leads AS l \
                 JOIN marketing.ads a ON a.lead = l.id WHERE o.total > 0",
            )
            .unwrap();

        assert_eq!(
            refs,
            vec![
                TableReference::new(None, "sales", "orders"),
                TableReference::new(None, "crm", "leads"),
                TableReference::new(None, "marketing", "ads"),
            ]
        );
    }

    #[test]
    fn function_inside_comma_list_skipped() {
        let refs = extractor()
            .extract("SELECT * FROM ds.t, UNNEST(t.items) i, ds2.u")
            .unwrap();

        assert_eq!(
            refs,
            vec![
                TableReference::new(None, "ds", "t"),
                TableReference::new(None, "ds2", "u"),
            ]
        );
    }

    #[test]
    fn quoted_identifiers_normalize() {
        let refs = extractor()
            .extract("SELECT * FROM `Sales`.`Orders` JOIN \"sales\".\"ORDERS\" x ON true")
            .unwrap();

        assert_eq!(refs, vec![TableReference::new(None, "sales", "orders")]);
    }

    #[test]
    fn backticked_full_path() {
        let refs = extractor()
            .extract("SELECT * FROM `proj.ds.tbl`")
            .unwrap();

        assert_eq!(refs, vec![TableReference::new(Some("proj"), "ds", "tbl")]);
    }

    #[test]
    fn bare_table_name_rejected() {
        let result = extractor().extract("SELECT * FROM orders");
        assert!(matches!(
            result,
            Err(ExtractionError::UnqualifiedTable(name)) if name == "orders"
        ));
    }

    #[test]
    fn case_insensitive_clauses() {
        let refs = extractor()
            .extract("select * from sales.orders LEFT join   marketing.ads on true")
            .unwrap();

        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn subquery_parenthesis_not_a_reference() {
        let refs = extractor()
            .extract("SELECT * FROM (SELECT 1) x JOIN ds.t ON true")
            .unwrap();

        assert_eq!(refs, vec![TableReference::new(None, "ds", "t")]);
    }

    #[test]
    fn function_call_after_join_skipped() {
        let refs = extractor()
            .extract("SELECT * FROM ds.t JOIN UNNEST(t.items) i ON true")
            .unwrap();

        assert_eq!(refs, vec![TableReference::new(None, "ds", "t")]);
    }

    #[test]
    fn overlong_path_rejected() {
        let result = extractor().extract("SELECT * FROM a.b.c.d");
        assert!(matches!(
            result,
            Err(ExtractionError::MalformedReference(_))
        ));
    }
}

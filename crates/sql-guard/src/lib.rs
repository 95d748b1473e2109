//! Lexical safety checks for generated SQL.
//!
//! This is deliberately not a SQL parser: [`ReferenceExtractor`] scans
//! FROM/JOIN clauses for table references and [`SyntaxGuard`] rejects
//! statements that are empty or carry mutating keywords. Dataset aliases
//! introduced by subqueries or CTEs are not resolved.

mod extractor;
mod reference;
mod syntax;

pub use extractor::{ExtractionError, ReferenceExtractor};
pub use reference::TableReference;
pub use syntax::{SyntaxError, SyntaxGuard};

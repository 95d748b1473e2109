use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use access_control::AccessContext;

use crate::turn::Turn;

/// Failure from an external collaborator, classified for retry policy:
/// `Client` failures are deterministic and never retried; `Server` and
/// `Timeout` are retried with bounded backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("Upstream rejected the request: {0}")]
    Client(String),

    #[error("Upstream failure: {0}")]
    Server(String),

    #[error("Upstream request timed out")]
    Timeout,
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UpstreamError::Client(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub description: Option<String>,
    /// Abbreviated DDL or column listing, used as schema context for
    /// generation.
    pub schema: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub dataset: String,
    pub tables: Vec<TableDescriptor>,
}

/// One prior question/answer pair, supplied to generation as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub sql: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub question: String,
    /// Schema snippets in priority order (keyword-matched tables first).
    pub schema: Vec<String>,
    pub history: Vec<Exchange>,
}

#[derive(Debug, Clone)]
pub struct SqlCandidate {
    pub sql: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub text: String,
    pub chart_hint: Option<String>,
}

/// Rows plus execution stats from the analytical engine.
#[derive(Debug, Clone, Default)]
pub struct QueryRun {
    pub rows: Vec<serde_json::Value>,
    pub total_rows: u64,
    pub bytes_processed: u64,
}

/// Read-only dataset/table metadata, already scoped by the caller's
/// context.
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    async fn list(
        &self,
        context: &AccessContext,
        dataset: Option<&str>,
    ) -> Result<Vec<DatasetDescriptor>, UpstreamError>;
}

/// Read-only SQL execution. Implementations must reject non-SELECT
/// statements themselves as defense in depth, even though every statement
/// has already passed the syntax guard.
#[async_trait]
pub trait AnalyticalEngine: Send + Sync {
    async fn execute(&self, sql: &str, max_bytes: u64) -> Result<QueryRun, UpstreamError>;
}

/// Text-generation collaborator. Its output is always untrusted: every SQL
/// candidate passes the syntax guard and the access enforcer before
/// execution.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_sql(&self, request: &GenerationRequest)
    -> Result<SqlCandidate, UpstreamError>;

    async fn summarize(&self, question: &str, run: &QueryRun) -> Result<Summary, UpstreamError>;
}

/// Append-only store for conversation turns.
#[async_trait]
pub trait TurnStore: Send + Sync {
    async fn append(&self, turn: Turn) -> Result<(), UpstreamError>;
}

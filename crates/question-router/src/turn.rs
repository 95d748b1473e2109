use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a turn ended. `ExecutionFailed` is distinct from `Success` so that
/// partial progress (SQL generated and validated, execution failed) stays
/// visible in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeTag {
    Success,
    CacheHit,
    MetadataAnswered,
    AuthorizationDenied,
    ValidationRejected,
    ExecutionFailed,
    UpstreamFailed,
    QuotaExceeded,
}

/// One appended conversation turn: question, generated SQL (if any),
/// outcome, and the permission decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub subject: String,
    pub question: String,
    pub generated_sql: Option<String>,
    pub outcome: OutcomeTag,
    /// The enforcement decision, where one was reached.
    pub authorized: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        subject: &str,
        question: &str,
        generated_sql: Option<String>,
        outcome: OutcomeTag,
        authorized: Option<bool>,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            question: question.to_string(),
            generated_sql,
            outcome,
            authorized,
            created_at: Utc::now(),
        }
    }
}

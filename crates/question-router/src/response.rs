use serde::{Deserialize, Serialize};

/// The response contract to the caller. Every variant carries a
/// structured, actionable message; internal details never cross this
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouterResponse {
    Success {
        message: String,
        sql: Option<String>,
        row_count: Option<u64>,
        chart_hint: Option<String>,
        from_cache: bool,
    },
    AuthenticationError {
        message: String,
    },
    AuthorizationError {
        message: String,
    },
    ValidationError {
        message: String,
    },
    UpstreamError {
        message: String,
    },
    QuotaExceeded {
        message: String,
        period: String,
        limit: u64,
        consumed: u64,
    },
}

impl RouterResponse {
    pub fn authentication(message: impl std::fmt::Display) -> Self {
        Self::AuthenticationError {
            message: format!("{message}. Provide a valid bearer token and retry"),
        }
    }

    pub fn authorization(message: impl std::fmt::Display) -> Self {
        Self::AuthorizationError {
            message: message.to_string(),
        }
    }

    pub fn validation(message: impl std::fmt::Display) -> Self {
        Self::ValidationError {
            message: message.to_string(),
        }
    }

    pub fn upstream(message: impl std::fmt::Display) -> Self {
        Self::UpstreamError {
            message: format!("{message}. Try again shortly; the question was not lost"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RouterResponse::Success { .. })
    }
}

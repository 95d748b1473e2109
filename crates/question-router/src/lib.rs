//! Per-question orchestration: classification, generation, validation,
//! enforcement, execution, summarization, and persistence.
//!
//! The router is the only component that talks to the external
//! collaborators, and nothing it sends to the analytical engine bypasses
//! [`sql_guard::SyntaxGuard`] and [`access_control::AccessEnforcer`].

pub mod classify;
pub mod collaborators;
pub mod keywords;
pub mod response;
pub mod retry;
pub mod router;
pub mod turn;

pub use collaborators::{
    AnalyticalEngine, DatasetDescriptor, Exchange, GenerationRequest, QueryRun, SchemaCatalog,
    SqlCandidate, Summary, TableDescriptor, TextGenerator, TurnStore, UpstreamError,
};
pub use response::RouterResponse;
pub use retry::RetryPolicy;
pub use router::{QUERY_EXECUTE, QueryRouter, QuestionRequest, RouterConfig};
pub use turn::{OutcomeTag, Turn};

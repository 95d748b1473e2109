use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use access_control::{AccessContext, AccessEnforcer, PermissionResolver};
use common::env_const::{get_cache_ttl_secs, get_max_result_bytes};
use common::{Identity, TokenValidator};
use loupe_env::Environment;
use quota::QuotaGuard;
use result_cache::CacheGateway;
use sql_guard::{ReferenceExtractor, SyntaxGuard};

use crate::classify::{self, QuestionKind, normalize_question};
use crate::collaborators::{
    AnalyticalEngine, DatasetDescriptor, Exchange, GenerationRequest, QueryRun, SchemaCatalog,
    Summary, TextGenerator, TurnStore,
};
use crate::keywords::table_keywords;
use crate::response::RouterResponse;
use crate::retry::RetryPolicy;
use crate::turn::{OutcomeTag, Turn};

/// Permission required to run a data question.
pub const QUERY_EXECUTE: &str = "query:execute";

/// One incoming question, with the raw authorization header value.
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub authorization: Option<String>,
    pub question: String,
    pub history: Vec<Exchange>,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub max_result_bytes: u64,
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
}

impl RouterConfig {
    pub fn new_from_env(env: &dyn Environment) -> Result<Self, loupe_env::EnvError> {
        Ok(Self {
            max_result_bytes: get_max_result_bytes(env)?,
            cache_ttl: Duration::from_secs(get_cache_ttl_secs(env)?),
            retry: RetryPolicy::new_from_env(env)?,
        })
    }
}

/// The payload memoized per `(identity, question)`.
#[derive(Debug, Serialize, Deserialize)]
struct CachedAnswer {
    message: String,
    sql: Option<String>,
    row_count: Option<u64>,
    chart_hint: Option<String>,
}

/// Orchestrates one request: authenticate, resolve permissions, classify,
/// and run either the metadata or the data path.
///
/// Ordering is strict: no step begins before its predecessor's gate passes,
/// and every statement goes through the syntax guard and the access
/// enforcer before it is dispatched. Any failure short-circuits to a
/// persisted error turn.
pub struct QueryRouter {
    validator: TokenValidator,
    resolver: Arc<PermissionResolver>,
    extractor: ReferenceExtractor,
    cache: Arc<CacheGateway>,
    quota: Arc<QuotaGuard>,
    catalog: Arc<dyn SchemaCatalog>,
    engine: Arc<dyn AnalyticalEngine>,
    generator: Arc<dyn TextGenerator>,
    turns: Arc<dyn TurnStore>,
    config: RouterConfig,
}

impl QueryRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        validator: TokenValidator,
        resolver: Arc<PermissionResolver>,
        extractor: ReferenceExtractor,
        cache: Arc<CacheGateway>,
        quota: Arc<QuotaGuard>,
        catalog: Arc<dyn SchemaCatalog>,
        engine: Arc<dyn AnalyticalEngine>,
        generator: Arc<dyn TextGenerator>,
        turns: Arc<dyn TurnStore>,
        config: RouterConfig,
    ) -> Self {
        Self {
            validator,
            resolver,
            extractor,
            cache,
            quota,
            catalog,
            engine,
            generator,
            turns,
            config,
        }
    }

    #[instrument(skip_all)]
    pub async fn handle(&self, request: &QuestionRequest) -> RouterResponse {
        let identity = match self.authenticate(request) {
            Ok(identity) => identity,
            Err(response) => return response,
        };

        let bundle = self.resolver.resolve(identity.subject()).await;
        let context = AccessContext::new(identity, bundle);

        match classify::classify(&request.question) {
            QuestionKind::Metadata => self.handle_metadata(&context, request).await,
            QuestionKind::Data => self.handle_data(&context, request).await,
        }
    }

    fn authenticate(&self, request: &QuestionRequest) -> Result<Identity, RouterResponse> {
        let token = TokenValidator::extract_bearer(request.authorization.as_deref())
            .map_err(RouterResponse::authentication)?;
        let claims = self
            .validator
            .validate(token)
            .map_err(RouterResponse::authentication)?;
        Identity::from_claims(&claims).map_err(RouterResponse::authentication)
    }

    async fn handle_metadata(
        &self,
        context: &AccessContext,
        request: &QuestionRequest,
    ) -> RouterResponse {
        let subject = context.subject();

        let mut descriptors = match self.catalog.list(context, None).await {
            Ok(descriptors) => descriptors,
            Err(error) => {
                warn!(%error, "Metadata lookup failed");
                self.persist(Turn::new(
                    subject,
                    &request.question,
                    None,
                    OutcomeTag::UpstreamFailed,
                    Some(true),
                ))
                .await;
                return RouterResponse::upstream(format!(
                    "Could not load metadata. Your authorized datasets are: {}",
                    format_listing(&context.authorized_datasets())
                ));
            }
        };

        // The catalog is already scoped by the context; filtering again
        // keeps the answer correct even against a misbehaving collaborator.
        descriptors.retain(|descriptor| context.can_access_dataset(&descriptor.dataset));

        self.persist(Turn::new(
            subject,
            &request.question,
            None,
            OutcomeTag::MetadataAnswered,
            Some(true),
        ))
        .await;

        RouterResponse::Success {
            message: describe_datasets(&descriptors),
            sql: None,
            row_count: None,
            chart_hint: None,
            from_cache: false,
        }
    }

    async fn handle_data(
        &self,
        context: &AccessContext,
        request: &QuestionRequest,
    ) -> RouterResponse {
        let subject = context.subject();
        let question = &request.question;

        // Permission gate first: an identity without query:execute gets an
        // immediate denial, with zero collaborator calls.
        if let Err(error) = AccessEnforcer::enforce(context, QUERY_EXECUTE, &[]) {
            self.persist(Turn::new(
                subject,
                question,
                None,
                OutcomeTag::AuthorizationDenied,
                Some(false),
            ))
            .await;
            return RouterResponse::authorization(error);
        }

        let cache_key = cache_key(question);
        if let Some(payload) = self.cache.read(subject, &cache_key) {
            if let Ok(answer) = serde_json::from_value::<CachedAnswer>(payload) {
                debug!(subject, "Answering from cache");
                self.persist(Turn::new(
                    subject,
                    question,
                    answer.sql.clone(),
                    OutcomeTag::CacheHit,
                    Some(true),
                ))
                .await;
                return RouterResponse::Success {
                    message: answer.message,
                    sql: answer.sql,
                    row_count: answer.row_count,
                    chart_hint: answer.chart_hint,
                    from_cache: true,
                };
            }
        }

        // Quota gates the text-generation call.
        let cost = estimate_cost(question);
        if let Err(exceeded) = self.quota.admit(subject, cost).await {
            self.persist(Turn::new(
                subject,
                question,
                None,
                OutcomeTag::QuotaExceeded,
                Some(true),
            ))
            .await;
            return RouterResponse::QuotaExceeded {
                message: format!(
                    "Your {} quota is exhausted ({} of {} tokens used, {} remaining). It resets at the next period boundary",
                    exceeded.period,
                    exceeded.consumed,
                    exceeded.limit,
                    exceeded.remaining()
                ),
                period: exceeded.period.to_string(),
                limit: exceeded.limit,
                consumed: exceeded.consumed,
            };
        }

        let generation = GenerationRequest {
            question: question.clone(),
            schema: self.schema_snippets(context, question).await,
            history: request.history.clone(),
        };

        let candidate = match self
            .config
            .retry
            .run(|| self.generator.generate_sql(&generation))
            .await
        {
            Ok(candidate) => candidate,
            Err(error) => {
                self.persist(Turn::new(
                    subject,
                    question,
                    None,
                    OutcomeTag::UpstreamFailed,
                    Some(true),
                ))
                .await;
                return RouterResponse::upstream(format!("Could not translate the question: {error}"));
            }
        };

        self.quota.record(subject, cost).await;

        if let Err(error) = SyntaxGuard::check(&candidate.sql) {
            self.persist(Turn::new(
                subject,
                question,
                Some(candidate.sql.clone()),
                OutcomeTag::ValidationRejected,
                None,
            ))
            .await;
            return RouterResponse::validation(error);
        }

        let references = match self.extractor.extract(&candidate.sql) {
            Ok(references) => references,
            Err(error) => {
                self.persist(Turn::new(
                    subject,
                    question,
                    Some(candidate.sql.clone()),
                    OutcomeTag::ValidationRejected,
                    None,
                ))
                .await;
                return RouterResponse::validation(error);
            }
        };

        if let Err(error) = AccessEnforcer::enforce(context, QUERY_EXECUTE, &references) {
            self.persist(Turn::new(
                subject,
                question,
                Some(candidate.sql.clone()),
                OutcomeTag::AuthorizationDenied,
                Some(false),
            ))
            .await;
            return RouterResponse::authorization(error);
        }

        let run = match self
            .config
            .retry
            .run(|| self.engine.execute(&candidate.sql, self.config.max_result_bytes))
            .await
        {
            Ok(run) => run,
            Err(error) => {
                // Partial progress: the SQL was generated and authorized.
                self.persist(Turn::new(
                    subject,
                    question,
                    Some(candidate.sql.clone()),
                    OutcomeTag::ExecutionFailed,
                    Some(true),
                ))
                .await;
                return RouterResponse::upstream(format!(
                    "The query was authorized but execution failed: {error}"
                ));
            }
        };

        let summary = self.summarize(question, &run).await;

        let answer = CachedAnswer {
            message: summary.text,
            sql: Some(candidate.sql.clone()),
            row_count: Some(run.total_rows),
            chart_hint: summary.chart_hint,
        };

        match serde_json::to_value(&answer) {
            Ok(payload) => {
                if let Err(error) =
                    self.cache
                        .write(subject, &cache_key, payload, self.config.cache_ttl)
                {
                    warn!(%error, "Skipping cache write");
                }
            }
            Err(error) => warn!(%error, "Could not serialize answer for caching"),
        }

        self.persist(Turn::new(
            subject,
            question,
            Some(candidate.sql),
            OutcomeTag::Success,
            Some(true),
        ))
        .await;

        RouterResponse::Success {
            message: answer.message,
            sql: answer.sql,
            row_count: answer.row_count,
            chart_hint: answer.chart_hint,
            from_cache: false,
        }
    }

    /// Summaries always distinguish "succeeded with zero rows" from error
    /// states; the summarization call itself is best-effort.
    async fn summarize(&self, question: &str, run: &QueryRun) -> Summary {
        if run.total_rows == 0 {
            return Summary {
                text: "The query ran successfully and returned 0 rows. Try widening the filters or the date range".to_string(),
                chart_hint: None,
            };
        }

        match self.generator.summarize(question, run).await {
            Ok(summary) => summary,
            Err(error) => {
                warn!(%error, "Summarization failed; falling back to row count");
                Summary {
                    text: format!("The query returned {} rows", run.total_rows),
                    chart_hint: None,
                }
            }
        }
    }

    /// Schema context for generation, keyword-matched tables first.
    /// Best-effort: a catalog outage degrades generation quality, it does
    /// not fail the turn.
    async fn schema_snippets(&self, context: &AccessContext, question: &str) -> Vec<String> {
        let descriptors = match self.catalog.list(context, None).await {
            Ok(descriptors) => descriptors,
            Err(error) => {
                warn!(%error, "Schema context unavailable; generating without it");
                return Vec::new();
            }
        };

        let mut snippets: Vec<(String, String)> = descriptors
            .iter()
            .flat_map(|descriptor| {
                descriptor.tables.iter().map(|table| {
                    (
                        format!("{}.{}", descriptor.dataset, table.name),
                        table.schema.clone(),
                    )
                })
            })
            .collect();

        let names: Vec<String> = snippets.iter().map(|(name, _)| name.clone()).collect();
        let prioritized = table_keywords(question, &names);

        snippets.sort_by_key(|(name, _)| {
            prioritized
                .iter()
                .position(|p| p == name)
                .unwrap_or(usize::MAX)
        });

        snippets
            .into_iter()
            .map(|(name, schema)| format!("{name}: {schema}"))
            .collect()
    }

    /// A persistence failure never invalidates an already-computed answer.
    async fn persist(&self, turn: Turn) {
        if let Err(error) = self.turns.append(turn).await {
            warn!(%error, "Failed to persist turn; continuing");
        }
    }
}

fn cache_key(question: &str) -> String {
    let normalized = normalize_question(question);
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

/// Rough four-characters-per-token estimate plus prompt overhead.
fn estimate_cost(question: &str) -> u64 {
    64 + (question.len() as u64) / 4
}

fn format_listing(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn describe_datasets(descriptors: &[DatasetDescriptor]) -> String {
    if descriptors.is_empty() {
        return "You do not have access to any datasets yet. Ask an administrator for a grant"
            .to_string();
    }

    let parts: Vec<String> = descriptors
        .iter()
        .map(|descriptor| {
            let tables: Vec<&str> = descriptor
                .tables
                .iter()
                .map(|table| table.name.as_str())
                .collect();
            format!("{} ({})", descriptor.dataset, tables.join(", "))
        })
        .collect();

    format!("You can query: {}", parts.join("; "))
}

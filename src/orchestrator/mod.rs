//! Query orchestration module
//!
//! Routes a query through the decision agent, fans out to the selected
//! sources under their rate limits and the shared cache, and synthesizes one
//! answer. Source failures and timeouts are recorded as data in the result;
//! only invalid input is returned as an error.

mod models;
mod synthesis;

pub use models::*;
pub use synthesis::{synthesize, Synthesis, NO_DATA_CONFIDENCE};

use crate::cache::CacheManager;
use crate::config::OrchestratorSettings;
use crate::decision::DecisionAgent;
use crate::error::{Error, SourceError};
use crate::metrics::Metrics;
use crate::query::{Query, QueryContext};
use crate::ratelimit::{RateLimiter, RateLimiterSet};
use crate::results::{SourceResult, SourceStatus};
use crate::sources::{SourceClient, SourceId, SourceRegistry};
use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Coordinates decision, rate limiting, caching and source calls
pub struct Orchestrator {
    settings: OrchestratorSettings,
    agent: DecisionAgent,
    limiters: Arc<RateLimiterSet>,
    cache: Arc<CacheManager>,
    registry: Arc<SourceRegistry>,
    metrics: Arc<Metrics>,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        agent: DecisionAgent,
        limiters: Arc<RateLimiterSet>,
        cache: Arc<CacheManager>,
        registry: Arc<SourceRegistry>,
    ) -> Self {
        Self {
            settings,
            agent,
            limiters,
            cache,
            registry,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Share an existing metrics collector
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.settings.source_timeout)
    }

    /// Answer one query
    pub async fn process_query(
        &self,
        text: &str,
        context: QueryContext,
    ) -> Result<AggregateResult, Error> {
        let start = Instant::now();
        let query = Query::with_context(text, context)?;
        let request_id = Uuid::new_v4().to_string();
        self.metrics.inc_query();

        let decision = self.agent.decide(query.text());
        info!(
            "Request {} ({} chars) routed as {} to {} source(s)",
            request_id,
            query.text().chars().count(),
            decision.intent(),
            decision.sources().len()
        );
        debug!("Request {} query: {:?}", request_id, query.text());

        let query = Arc::new(query);
        let tasks = decision
            .sources()
            .iter()
            .map(|&source| self.run_source(source, query.clone()));

        let results: BTreeMap<SourceId, SourceResult> = join_all(tasks)
            .await
            .into_iter()
            .map(|result| (result.source, result))
            .collect();

        for result in results.values() {
            self.metrics.record(result);
        }

        let synthesis = synthesize(&decision, &results);

        let sources_used: Vec<SourceId> = results
            .values()
            .filter(|r| r.is_success())
            .map(|r| r.source)
            .collect();
        let sources_failed: Vec<SourceId> = results
            .values()
            .filter(|r| !r.is_success())
            .map(|r| r.source)
            .collect();
        let cached_sources: Vec<SourceId> = results
            .values()
            .filter(|r| r.cached)
            .map(|r| r.source)
            .collect();

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Request {} finished in {}ms: {} ok, {} failed, {} cached",
            request_id,
            processing_time_ms,
            sources_used.len(),
            sources_failed.len(),
            cached_sources.len()
        );

        let metadata = ResultMetadata {
            processing_time_ms,
            pii_report: query.context().pii_report.clone(),
            confidence: synthesis.confidence,
            sources_used,
            sources_failed,
            cached_sources,
            use_documents: decision.use_documents(),
            timestamp: Utc::now(),
        };

        Ok(AggregateResult {
            request_id,
            decision,
            results,
            synthesis: synthesis.text,
            records: synthesis.records,
            metadata,
        })
    }

    /// Answer a batch of queries sharing one context
    pub async fn process_batch(
        &self,
        queries: Vec<String>,
        options: BatchOptions,
    ) -> Result<BatchResult, Error> {
        let context = options.context.clone();
        let items = queries.into_iter().map(|q| (q, context.clone())).collect();
        self.process_batch_with(items, options.concurrency).await
    }

    /// Answer a batch of queries, each with its own context.
    ///
    /// The batch is rejected up front when empty or larger than
    /// `max_batch_size`. Otherwise every query is processed independently
    /// and outcomes keep the input order.
    pub async fn process_batch_with(
        &self,
        items: Vec<(String, QueryContext)>,
        concurrency: Option<usize>,
    ) -> Result<BatchResult, Error> {
        if items.is_empty() {
            return Err(Error::invalid("batch must contain at least one query"));
        }
        if items.len() > self.settings.max_batch_size {
            return Err(Error::invalid(format!(
                "batch of {} queries exceeds the maximum of {}",
                items.len(),
                self.settings.max_batch_size
            )));
        }

        let start = Instant::now();
        self.metrics.inc_batch();

        let limit = self.settings.batch_concurrency.max(1);
        let concurrency = concurrency.unwrap_or(limit).clamp(1, limit);
        let total = items.len();
        info!("Processing batch of {} queries ({} at a time)", total, concurrency);

        let outcomes: Vec<(usize, String, Result<AggregateResult, Error>)> =
            stream::iter(items.into_iter().enumerate())
                .map(|(index, (text, context))| async move {
                    let result = self.process_query(&text, context).await;
                    (index, text, result)
                })
                .buffered(concurrency)
                .collect()
                .await;

        let mut results = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for (index, query, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(BatchOutcome::Success(Box::new(result))),
                Err(Error::InvalidInput(message)) => {
                    warn!("Batch query {} rejected: {}", index, message);
                    results.push(BatchOutcome::Failure(BatchFailure {
                        index,
                        error: "invalid_input".to_string(),
                        message: message.clone(),
                    }));
                    errors.push(BatchError {
                        index,
                        query,
                        message,
                    });
                }
            }
        }

        let failed = errors.len();
        Ok(BatchResult {
            results,
            errors,
            metadata: BatchMetadata {
                total,
                succeeded: total - failed,
                failed,
                processing_time_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    /// Report limiter tokens, cache tiers and source reachability
    pub async fn health_check(&self) -> HealthReport {
        let cache = self.cache.health_check().await;
        let rate_limiters = self.limiters.status();

        let default = self.default_timeout();
        let probes = self.registry.iter().map(|(&id, client)| {
            let client = client.clone();
            let deadline = self.registry.timeout(id, default);
            async move { (id, Self::probe(client, deadline).await) }
        });
        let sources: BTreeMap<SourceId, SourceHealth> =
            join_all(probes).await.into_iter().collect();

        let degraded = cache.is_degraded()
            || sources.values().any(|s| s.status == ApiStatus::Unhealthy);

        HealthReport {
            status: if degraded {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            },
            timestamp: Utc::now(),
            services: Services {
                cache,
                rate_limiters,
                external_apis: ExternalApis { sources },
            },
        }
    }

    async fn probe(client: Arc<dyn SourceClient>, deadline: Duration) -> SourceHealth {
        let start = Instant::now();
        let outcome = match timeout(deadline, client.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("ping timed out".to_string()),
        };

        if let Err(e) = &outcome {
            warn!("Health probe for {} failed: {}", client.id(), e);
        }

        SourceHealth {
            status: if outcome.is_ok() {
                ApiStatus::Healthy
            } else {
                ApiStatus::Unhealthy
            },
            timestamp: Utc::now(),
            latency_ms: start.elapsed().as_millis() as u64,
            error: outcome.err(),
        }
    }

    /// Run one source under its deadline.
    ///
    /// The work is spawned so that a call outliving its deadline still
    /// finishes in the background and can fill the cache; its result never
    /// reaches this request.
    async fn run_source(&self, source: SourceId, query: Arc<Query>) -> SourceResult {
        let Some(client) = self.registry.get(source) else {
            warn!("No client registered for source {}", source);
            return SourceResult::failure(
                source,
                SourceStatus::Error,
                SourceError::NotConfigured.to_string(),
                0,
            );
        };

        let start = Instant::now();
        let deadline = self.registry.timeout(source, self.default_timeout());
        let task = tokio::spawn(fetch_source(
            client,
            self.limiters.get(source),
            self.cache.clone(),
            query,
        ));

        match timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Task for source {} failed: {}", source, e);
                SourceResult::failure(
                    source,
                    SourceStatus::Error,
                    "source task failed",
                    start.elapsed().as_millis() as u64,
                )
            }
            Err(_) => {
                warn!("Source {} exceeded its {:?} deadline", source, deadline);
                SourceResult::failure(
                    source,
                    SourceStatus::Timeout,
                    format!("no response within {}ms", deadline.as_millis()),
                    start.elapsed().as_millis() as u64,
                )
            }
        }
    }
}

/// Cache key input for one source and query.
///
/// The full canonical text is hashed so that the truncated key still depends
/// on every byte of it.
fn fingerprint(source: SourceId, query: &Query) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(query.canonical().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Acquire a token, consult the cache, then call the source on a miss
async fn fetch_source(
    client: Arc<dyn SourceClient>,
    limiter: Option<Arc<RateLimiter>>,
    cache: Arc<CacheManager>,
    query: Arc<Query>,
) -> SourceResult {
    let source = client.id();

    if let Some(limiter) = limiter {
        limiter.acquire().await;
    }

    let start = Instant::now();
    let key = cache.key_for(&fingerprint(source, &query));

    if let Some(mut cached) = cache.get_json::<SourceResult>(&key).await {
        if cached.source == source && cached.is_success() {
            debug!("Cache hit for source {}", source);
            cached.cached = true;
            cached.latency_ms = start.elapsed().as_millis() as u64;
            return cached;
        }
    }

    match client.fetch(&query).await {
        Ok(records) => {
            let latency = start.elapsed().as_millis() as u64;
            debug!("Source {} returned {} records in {}ms", source, records.len(), latency);
            let result = SourceResult::success(source, records, latency);
            cache.set_json(&key, &result, cache.default_ttl()).await;
            result
        }
        Err(e) => {
            warn!("Source {} failed: {}", source, e);
            let status = match e {
                SourceError::RateLimited => SourceStatus::RateLimited,
                _ => SourceStatus::Error,
            };
            SourceResult::failure(source, status, e.to_string(), start.elapsed().as_millis() as u64)
        }
    }
}

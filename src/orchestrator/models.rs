//! Orchestrator request and response models

use crate::cache::CacheHealth;
use crate::decision::Decision;
use crate::query::{PiiReport, QueryContext};
use crate::ratelimit::LimiterStatus;
use crate::results::{Record, SourceResult};
use crate::sources::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Answer to a single query
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub request_id: String,
    pub decision: Decision,
    /// One outcome per selected source
    pub results: BTreeMap<SourceId, SourceResult>,
    pub synthesis: String,
    /// Merged records from every successful source, best first
    pub records: Vec<Record>,
    pub metadata: ResultMetadata,
}

impl AggregateResult {
    /// Sources that produced data
    pub fn successful_sources(&self) -> Vec<SourceId> {
        self.results
            .values()
            .filter(|r| r.is_success())
            .map(|r| r.source)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultMetadata {
    /// Wall-clock time from request start to synthesis
    pub processing_time_ms: u64,
    /// Passed through from the request context
    pub pii_report: Option<PiiReport>,
    /// Confidence of the synthesized answer
    pub confidence: f64,
    pub sources_used: Vec<SourceId>,
    pub sources_failed: Vec<SourceId>,
    pub cached_sources: Vec<SourceId>,
    pub use_documents: bool,
    pub timestamp: DateTime<Utc>,
}

/// Options for a batch request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Queries processed at the same time; capped by configuration
    pub concurrency: Option<usize>,
    /// Context applied to every query of the batch
    pub context: QueryContext,
}

/// Error placeholder for a query that could not be answered
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
    pub message: String,
}

/// Per-query outcome, in input order
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    Success(Box<AggregateResult>),
    Failure(BatchFailure),
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn as_result(&self) -> Option<&AggregateResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Failure(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub index: usize,
    pub query: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchMetadata {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub results: Vec<BatchOutcome>,
    pub errors: Vec<BatchError>,
    pub metadata: BatchMetadata,
}

/// Overall service status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Serving, but some dependency is unavailable
    Degraded,
}

/// Reachability of one external API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub status: ApiStatus,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExternalApis {
    pub sources: BTreeMap<SourceId, SourceHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Services {
    pub cache: CacheHealth,
    pub rate_limiters: BTreeMap<SourceId, LimiterStatus>,
    pub external_apis: ExternalApis,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub services: Services,
}

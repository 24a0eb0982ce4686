//! MedQuery-RS: query routing and multi-source orchestration for biomedical
//! data sources
//!
//! A free-text medical query is classified by the [`decision::DecisionAgent`],
//! fanned out to the selected sources (ClinicalTrials.gov, PubMed, openFDA)
//! under per-source token buckets and a two-tier cache, and synthesized into a
//! single answer by the [`orchestrator::Orchestrator`].

pub mod cache;
pub mod config;
pub mod decision;
pub mod error;
pub mod metrics;
pub mod network;
pub mod orchestrator;
pub mod query;
pub mod ratelimit;
pub mod results;
pub mod sources;
pub mod web;

pub use config::Settings;
pub use decision::{Decision, DecisionAgent};
pub use error::{Error, SourceError};
pub use orchestrator::{AggregateResult, BatchResult, HealthReport, Orchestrator};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-source deadline in seconds
pub const DEFAULT_SOURCE_TIMEOUT: f64 = 10.0;

/// Default cache TTL in seconds
pub const DEFAULT_CACHE_TTL: u64 = 3600;

/// Maximum number of queries in one batch
pub const MAX_BATCH_SIZE: usize = 100;

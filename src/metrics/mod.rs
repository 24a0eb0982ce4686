//! Metrics collection module
//!
//! Tracks per-source call outcomes, latency, cache hits and query volume.

use crate::results::{SourceResult, SourceStatus};
use crate::sources::SourceId;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of latency samples kept per source
const LATENCY_WINDOW: usize = 100;

#[derive(Debug, Default)]
struct SourceCounters {
    requests: u64,
    successes: u64,
    errors: u64,
    rate_limited: u64,
    timeouts: u64,
    cache_hits: u64,
    /// Latency of completed upstream calls, most recent last
    latencies: VecDeque<u64>,
}

/// Process-wide metrics collector
pub struct Metrics {
    total_queries: AtomicU64,
    total_batches: AtomicU64,
    sources: RwLock<BTreeMap<SourceId, SourceCounters>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_queries: AtomicU64::new(0),
            total_batches: AtomicU64::new(0),
            sources: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn inc_query(&self) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_batch(&self) {
        self.total_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries.load(Ordering::Relaxed)
    }

    /// Record the outcome of one per-source task
    pub fn record(&self, result: &SourceResult) {
        let mut sources = self.write();
        let counters = sources.entry(result.source).or_default();
        counters.requests += 1;

        if result.cached {
            counters.cache_hits += 1;
        } else if result.status != SourceStatus::Timeout {
            if counters.latencies.len() >= LATENCY_WINDOW {
                counters.latencies.pop_front();
            }
            counters.latencies.push_back(result.latency_ms);
        }

        match result.status {
            SourceStatus::Success => counters.successes += 1,
            SourceStatus::Error => counters.errors += 1,
            SourceStatus::RateLimited => counters.rate_limited += 1,
            SourceStatus::Timeout => counters.timeouts += 1,
        }
    }

    /// Average latency of recent upstream calls
    pub fn avg_latency(&self, source: SourceId) -> Option<u64> {
        let sources = self.read();
        sources.get(&source).and_then(|c| Self::average(&c.latencies))
    }

    /// Percentage of settled calls that succeeded; 100 before any call
    pub fn reliability(&self, source: SourceId) -> f64 {
        let sources = self.read();
        sources.get(&source).map_or(100.0, Self::reliability_of)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let sources = self.read();
        let stats = sources
            .iter()
            .map(|(id, c)| {
                (
                    *id,
                    SourceStats {
                        requests: c.requests,
                        successes: c.successes,
                        errors: c.errors,
                        rate_limited: c.rate_limited,
                        timeouts: c.timeouts,
                        cache_hits: c.cache_hits,
                        avg_latency_ms: Self::average(&c.latencies),
                        reliability: Self::reliability_of(c),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            total_queries: self.total_queries(),
            total_batches: self.total_batches.load(Ordering::Relaxed),
            sources: stats,
        }
    }

    fn average(latencies: &VecDeque<u64>) -> Option<u64> {
        if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<u64>() / latencies.len() as u64)
        }
    }

    fn reliability_of(counters: &SourceCounters) -> f64 {
        if counters.requests == 0 {
            100.0
        } else {
            (counters.successes as f64 / counters.requests as f64) * 100.0
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<SourceId, SourceCounters>> {
        self.sources.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<SourceId, SourceCounters>> {
        self.sources.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a single source
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub rate_limited: u64,
    pub timeouts: u64,
    pub cache_hits: u64,
    pub avg_latency_ms: Option<u64>,
    pub reliability: f64,
}

/// Serializable view of all metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub total_batches: u64,
    pub sources: BTreeMap<SourceId, SourceStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_query();
        metrics.record(&SourceResult::success(SourceId::PubMed, vec![], 100));
        metrics.record(&SourceResult::success(SourceId::PubMed, vec![], 300));

        assert_eq!(metrics.total_queries(), 1);
        assert_eq!(metrics.avg_latency(SourceId::PubMed), Some(200));
        assert_eq!(metrics.reliability(SourceId::PubMed), 100.0);
        assert_eq!(metrics.reliability(SourceId::OpenFda), 100.0);
    }

    #[test]
    fn test_failures_and_cache_hits() {
        let metrics = Metrics::new();
        let source = SourceId::OpenFda;

        metrics.record(&SourceResult::success(source, vec![], 50));
        metrics.record(&SourceResult::failure(source, SourceStatus::Error, "boom", 10));
        metrics.record(&SourceResult::failure(source, SourceStatus::Timeout, "deadline", 10_000));

        let mut cached = SourceResult::success(source, vec![], 0);
        cached.cached = true;
        metrics.record(&cached);

        let snapshot = metrics.snapshot();
        let stats = &snapshot.sources[&source];
        assert_eq!(stats.requests, 4);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.cache_hits, 1);
        // timeouts and cache hits are excluded from latency
        assert_eq!(stats.avg_latency_ms, Some(30));
        assert_eq!(stats.reliability, 50.0);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let metrics = Metrics::new();
        for _ in 0..LATENCY_WINDOW {
            metrics.record(&SourceResult::success(SourceId::PubMed, vec![], 1000));
        }
        for _ in 0..LATENCY_WINDOW {
            metrics.record(&SourceResult::success(SourceId::PubMed, vec![], 10));
        }
        assert_eq!(metrics.avg_latency(SourceId::PubMed), Some(10));
    }
}

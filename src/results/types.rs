//! Result type definitions

use crate::sources::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single record returned by an external source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Source-native identifier (NCT id, PMID, label set id)
    pub id: String,
    /// Title of the record
    pub title: String,
    /// Canonical link to the record
    pub url: String,
    /// Short description or abstract excerpt
    pub summary: Option<String>,
    /// Source that returned this record
    pub source: SourceId,
    /// All sources that returned this record (after merging)
    #[serde(default)]
    pub sources: BTreeSet<SourceId>,
    /// 1-indexed position in each source's listing
    #[serde(default)]
    pub positions: Vec<u32>,
    /// Publication or last-update date as reported upstream
    pub published: Option<String>,
    /// Source-specific attributes (status, journal, brand name, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        source: SourceId,
    ) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(source);

        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            summary: None,
            source,
            sources,
            positions: vec![],
            published: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.positions.push(position);
        self
    }

    pub fn with_published(mut self, published: impl Into<String>) -> Self {
        self.published = Some(published.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Merge another record for the same item into this one
    pub fn merge(&mut self, other: &Record) {
        self.sources.extend(other.sources.iter().copied());
        self.positions.extend(other.positions.iter().copied());

        if self.summary.is_none() && other.summary.is_some() {
            self.summary = other.summary.clone();
        }
        for (key, value) in &other.attributes {
            self.attributes
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Relevance score: agreement across sources, discounted by position
    pub fn score(&self) -> f64 {
        let weight = self.sources.len() as f64;
        self.positions.iter().map(|&pos| weight / pos.max(1) as f64).sum()
    }
}

/// Outcome of one source call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    Error,
    RateLimited,
    Timeout,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-source outcome for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    pub source: SourceId,
    pub status: SourceStatus,
    /// Records returned (empty unless status is success)
    pub records: Vec<Record>,
    /// Time spent on this source for the current request
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Served from cache rather than the upstream API
    #[serde(default)]
    pub cached: bool,
    /// Failure description for non-success statuses
    pub error: Option<String>,
}

impl SourceResult {
    pub fn success(source: SourceId, records: Vec<Record>, latency_ms: u64) -> Self {
        Self {
            source,
            status: SourceStatus::Success,
            records,
            latency_ms,
            timestamp: Utc::now(),
            cached: false,
            error: None,
        }
    }

    pub fn failure(
        source: SourceId,
        status: SourceStatus,
        error: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            source,
            status,
            records: vec![],
            latency_ms,
            timestamp: Utc::now(),
            cached: false,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SourceStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_merge() {
        let url = "https://example.org/a";
        let mut a =
            Record::new("NCT01234567", "Trial", url, SourceId::ClinicalTrials).with_position(1);
        let b = Record::new("NCT01234567", "Trial", "https://example.org/a", SourceId::PubMed)
            .with_position(3)
            .with_summary("abstract")
            .with_attribute("journal", "Lancet");

        a.merge(&b);

        assert_eq!(a.sources.len(), 2);
        assert_eq!(a.positions, vec![1, 3]);
        assert_eq!(a.summary.as_deref(), Some("abstract"));
        assert_eq!(a.attributes.get("journal").map(String::as_str), Some("Lancet"));
    }

    #[test]
    fn test_record_score() {
        let first = Record::new("1", "a", "u1", SourceId::PubMed).with_position(1);
        let fifth = Record::new("2", "b", "u2", SourceId::PubMed).with_position(5);
        assert!(first.score() > fifth.score());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SourceStatus::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
    }
}

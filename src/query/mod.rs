//! Query module
//!
//! A [`Query`] is the validated, immutable input to the orchestrator. It keeps
//! the raw text, a canonical form used for cache fingerprints, and the request
//! context supplied by the transport layer.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum query length in characters
pub const MIN_QUERY_CHARS: usize = 3;

/// Maximum query length in characters
pub const MAX_QUERY_CHARS: usize = 1000;

/// Words dropped when building keyword searches for upstream APIs
const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "are", "as", "at", "be", "by", "can", "could", "do",
    "does", "for", "from", "how", "i", "in", "is", "it", "me", "my", "of", "on", "or", "should",
    "show", "tell", "that", "the", "there", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "with", "you",
];

/// Summary of personally identifiable information found in the query text.
///
/// Produced by the transport layer's detector and passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiReport {
    /// Whether anything was detected
    pub detected: bool,
    /// Kinds of PII found (e.g. "email", "phone")
    pub types: Vec<String>,
    /// Total number of matches
    pub count: usize,
}

/// Caller-supplied request context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryContext {
    /// When the originating request was received
    pub timestamp: Option<DateTime<Utc>>,
    /// Free-form caller metadata
    pub caller: HashMap<String, String>,
    /// PII report from the validation collaborator
    pub pii_report: Option<PiiReport>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pii_report(mut self, report: PiiReport) -> Self {
        self.pii_report = Some(report);
        self
    }

    pub fn with_caller(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.caller.insert(key.into(), value.into());
        self
    }
}

/// Validated query
#[derive(Debug, Clone)]
pub struct Query {
    text: String,
    canonical: String,
    context: QueryContext,
}

impl Query {
    /// Validate and build a query with an empty context
    pub fn new(text: impl Into<String>) -> Result<Self, Error> {
        Self::with_context(text, QueryContext::default())
    }

    /// Validate and build a query
    pub fn with_context(text: impl Into<String>, context: QueryContext) -> Result<Self, Error> {
        let text = text.into();
        validate(&text)?;
        let canonical = canonicalize(&text);

        Ok(Self {
            text,
            canonical,
            context,
        })
    }

    /// Raw text as submitted
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Lowercased, whitespace-collapsed text
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    /// Keywords suitable for an upstream full-text search
    pub fn search_terms(&self) -> Vec<String> {
        let terms: Vec<String> = self
            .canonical
            .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '.' || c == '/'))
            .map(|t| t.trim_matches(|c: char| c == '.' || c == '-' || c == '/'))
            .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
            .map(str::to_string)
            .collect();

        if terms.is_empty() {
            vec![self.canonical.clone()]
        } else {
            terms
        }
    }
}

/// Check query shape: 3 to 1000 characters once surrounding whitespace is removed
pub fn validate(text: &str) -> Result<(), Error> {
    let len = text.trim().chars().count();
    if len < MIN_QUERY_CHARS {
        return Err(Error::invalid(format!(
            "query must be at least {} characters",
            MIN_QUERY_CHARS
        )));
    }
    if len > MAX_QUERY_CHARS {
        return Err(Error::invalid(format!(
            "query must be at most {} characters",
            MAX_QUERY_CHARS
        )));
    }
    Ok(())
}

/// Canonical form used for request fingerprints
pub fn canonicalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

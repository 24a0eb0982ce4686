//! Decision agent: maps a query string to an intent and candidate sources

use super::rules::{classify, default_domains, DomainRule, Identifier, IDENTIFIER_CONFIDENCE};
use super::types::{Decision, Intent};
use crate::sources::SourceId;
use tracing::debug;

/// Confidence of the general-medical fallback
pub const FALLBACK_CONFIDENCE: f64 = 0.6;

/// Rule-table query classifier.
///
/// `decide` is pure and never fails: anything the tables do not recognise
/// falls through to a general literature search.
#[derive(Debug, Clone)]
pub struct DecisionAgent {
    domains: Vec<DomainRule>,
}

impl DecisionAgent {
    /// Agent with the built-in domain table
    pub fn new() -> Self {
        Self::with_domains(default_domains())
    }

    /// Agent with a custom domain table (order is the tie-break order)
    pub fn with_domains(domains: Vec<DomainRule>) -> Self {
        Self { domains }
    }

    pub fn domains(&self) -> &[DomainRule] {
        &self.domains
    }

    /// Classify a query
    pub fn decide(&self, query: &str) -> Decision {
        if let Some(identifier) = Identifier::detect(query) {
            debug!("Identifier match: {:?}", identifier);
            let reasoning = format!(
                "Matched {} {}; routing to {}",
                identifier.label(),
                identifier.value(),
                join_sources(&identifier.sources())
            );
            return Decision::new(
                identifier.intent(),
                IDENTIFIER_CONFIDENCE,
                identifier.sources(),
                reasoning,
            )
            .with_identifier(identifier);
        }

        let lowered = query.to_lowercase();
        if let Some(best) = classify(&self.domains, &lowered) {
            let rule = &self.domains[best.index];
            debug!(
                "Domain match: {} (raw {:.2}, combined {:.2})",
                rule.name, best.raw_score, best.combined
            );
            let reasoning = format!(
                "Classified as {}: {} pattern(s) matched, score {:.2} x base confidence {:.2}",
                rule.name, best.matched, best.raw_score, rule.base_confidence
            );
            return Decision::new(rule.intent, best.combined, rule.sources.clone(), reasoning);
        }

        Decision::new(
            Intent::GeneralMedical,
            FALLBACK_CONFIDENCE,
            [SourceId::PubMed],
            "No identifier or domain pattern matched; general literature search",
        )
    }
}

impl Default for DecisionAgent {
    fn default() -> Self {
        Self::new()
    }
}

fn join_sources(sources: &[SourceId]) -> String {
    sources
        .iter()
        .map(SourceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

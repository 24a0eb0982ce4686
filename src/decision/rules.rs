//! Classification rule tables
//!
//! Two tables drive the decision agent: high-precision identifier patterns,
//! checked first, and an ordered list of domain rules scored against the
//! lowercased query. Adding a domain means adding a [`DomainRule`] entry.

use super::types::Intent;
use crate::sources::SourceId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Confidence assigned when a specific identifier is found
pub const IDENTIFIER_CONFIDENCE: f64 = 0.95;

/// Score contributed by each matching domain pattern
pub const PATTERN_INCREMENT: f64 = 0.4;

/// Raw score a domain must exceed to be selected
pub const DOMAIN_THRESHOLD: f64 = 0.3;

static TRIAL_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bNCT\d{8}\b").expect("valid regex"));
static PMID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bPMID\s*:?\s*(\d{1,8})\b").expect("valid regex"));
static PMC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bPMC\d{4,8}\b").expect("valid regex"));
static DOI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b10\.\d{4,9}/[-._;()/:A-Za-z0-9]+").expect("valid regex"));
static FDA_APPLICATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(NDA|ANDA|BLA)\s?(\d{6})\b").expect("valid regex"));

/// A specific identifier found in the query text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identifier {
    /// ClinicalTrials.gov id, e.g. NCT01234567
    Trial(String),
    /// PubMed id (digits only)
    Pmid(String),
    /// PubMed Central id, e.g. PMC1234567
    Pmc(String),
    Doi(String),
    /// FDA application number, e.g. NDA020402
    FdaApplication(String),
}

impl Identifier {
    /// Find the first identifier in the text, checking trial ids, PMIDs, PMC
    /// ids, DOIs and FDA application numbers in that order
    pub fn detect(text: &str) -> Option<Self> {
        if let Some(m) = TRIAL_ID.find(text) {
            return Some(Self::Trial(m.as_str().to_uppercase()));
        }
        if let Some(cap) = PMID.captures(text) {
            return Some(Self::Pmid(cap[1].to_string()));
        }
        if let Some(m) = PMC_ID.find(text) {
            return Some(Self::Pmc(m.as_str().to_uppercase()));
        }
        if let Some(m) = DOI.find(text) {
            let doi = m.as_str().trim_end_matches(['.', ',', ';', ')']);
            return Some(Self::Doi(doi.to_string()));
        }
        if let Some(cap) = FDA_APPLICATION.captures(text) {
            return Some(Self::FdaApplication(format!(
                "{}{}",
                cap[1].to_uppercase(),
                &cap[2]
            )));
        }
        None
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Trial(v)
            | Self::Pmid(v)
            | Self::Pmc(v)
            | Self::Doi(v)
            | Self::FdaApplication(v) => v,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Trial(_) => "clinical trial identifier",
            Self::Pmid(_) => "PubMed identifier",
            Self::Pmc(_) => "PubMed Central identifier",
            Self::Doi(_) => "DOI",
            Self::FdaApplication(_) => "FDA application number",
        }
    }

    pub fn intent(&self) -> Intent {
        match self {
            Self::Trial(_) => Intent::TrialLookup,
            Self::Pmid(_) | Self::Pmc(_) | Self::Doi(_) => Intent::LiteratureLookup,
            Self::FdaApplication(_) => Intent::DrugApplicationLookup,
        }
    }

    /// Fixed source set for this identifier type
    pub fn sources(&self) -> Vec<SourceId> {
        match self {
            Self::Trial(_) => vec![SourceId::ClinicalTrials, SourceId::PubMed],
            Self::Pmid(_) | Self::Pmc(_) | Self::Doi(_) => vec![SourceId::PubMed],
            Self::FdaApplication(_) => vec![SourceId::OpenFda],
        }
    }
}

/// One classification domain
#[derive(Debug, Clone)]
pub struct DomainRule {
    /// Domain name used in reasoning strings
    pub name: &'static str,
    pub intent: Intent,
    /// Patterns evaluated against the lowercased query
    pub patterns: Vec<Regex>,
    pub sources: Vec<SourceId>,
    pub base_confidence: f64,
}

impl DomainRule {
    pub fn new(
        name: &'static str,
        intent: Intent,
        patterns: &[&str],
        sources: Vec<SourceId>,
        base_confidence: f64,
    ) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            intent,
            patterns,
            sources,
            base_confidence,
        })
    }

    /// Number of patterns matching the (already lowercased) text
    pub fn matches(&self, lowered: &str) -> usize {
        self.patterns.iter().filter(|p| p.is_match(lowered)).count()
    }

    /// Raw pattern score, capped at 1.0
    pub fn raw_score(&self, lowered: &str) -> f64 {
        (self.matches(lowered) as f64 * PATTERN_INCREMENT).min(1.0)
    }
}

/// Winning domain of a classification pass
#[derive(Debug, Clone, PartialEq)]
pub struct DomainMatch {
    /// Index into the rule table
    pub index: usize,
    pub matched: usize,
    pub raw_score: f64,
    /// raw score times the domain's base confidence
    pub combined: f64,
}

/// Score every domain and pick the best one above threshold.
///
/// Ties go to the domain listed first.
pub fn classify(rules: &[DomainRule], lowered: &str) -> Option<DomainMatch> {
    let mut best: Option<DomainMatch> = None;

    for (index, rule) in rules.iter().enumerate() {
        let matched = rule.matches(lowered);
        let raw_score = (matched as f64 * PATTERN_INCREMENT).min(1.0);
        if raw_score <= DOMAIN_THRESHOLD {
            continue;
        }

        let combined = raw_score * rule.base_confidence;
        if best.as_ref().map_or(true, |b| combined > b.combined) {
            best = Some(DomainMatch {
                index,
                matched,
                raw_score,
                combined,
            });
        }
    }

    best
}

/// Default domain table, in tie-break order
pub fn default_domains() -> Vec<DomainRule> {
    vec![
        DomainRule::new(
            "clinical_trials",
            Intent::ClinicalTrials,
            &[
                r"\bclinical\s+trials?\b",
                r"\btrials?\b",
                r"\bphase\s+(?:[1-4]|i{1,3}|iv)\b",
                r"\b(?:recruiting|enrolling|enrollment|eligibility)\b",
                r"\bstudy\s+(?:participants|sites?|locations?)\b",
            ],
            vec![SourceId::ClinicalTrials, SourceId::PubMed],
            0.9,
        ),
        DomainRule::new(
            "drug_safety",
            Intent::DrugSafety,
            &[
                r"\bside[\s-]effects?\b",
                r"\badverse\s+(?:events?|reactions?|effects?)\b",
                r"\b(?:safety|safe|unsafe)\b",
                r"\b(?:recalls?|warnings?|black\s+box)\b",
                r"\b(?:toxicity|overdose|contraindications?)\b",
                r"\binteractions?\b",
            ],
            vec![SourceId::OpenFda, SourceId::PubMed],
            0.9,
        ),
        DomainRule::new(
            "drug_info",
            Intent::DrugInfo,
            &[
                r"\b(?:drugs?|medications?|medicines?)\b",
                r"\b(?:dose|doses|dosage|dosing)\b",
                r"\bindications?\b",
                r"\bmechanism\s+of\s+action\b",
                r"\b(?:label|labeling|prescribing\s+information)\b",
                r"\b(?:generic|brand)\s+names?\b",
            ],
            vec![SourceId::OpenFda],
            0.85,
        ),
        DomainRule::new(
            "literature_review",
            Intent::LiteratureReview,
            &[
                r"\b(?:research|studies|papers?|publications?|literature|articles?)\b",
                r"\b(?:systematic\s+review|meta-analysis|meta\s+analysis)\b",
                r"\brecent\s+(?:findings|advances|evidence|developments)\b",
                r"\bevidence\b",
            ],
            vec![SourceId::PubMed],
            0.8,
        ),
    ]
    .into_iter()
    .collect::<Result<Vec<_>, _>>()
    .expect("default domain patterns are valid")
}

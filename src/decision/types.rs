//! Decision data model

use super::rules::Identifier;
use crate::sources::SourceId;
use serde::Serialize;

/// Classified purpose of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Query names a specific trial registry id
    TrialLookup,
    /// Query names a PMID, PMC id or DOI
    LiteratureLookup,
    /// Query names an FDA application number
    DrugApplicationLookup,
    ClinicalTrials,
    DrugSafety,
    DrugInfo,
    LiteratureReview,
    GeneralMedical,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrialLookup => "trial_lookup",
            Self::LiteratureLookup => "literature_lookup",
            Self::DrugApplicationLookup => "drug_application_lookup",
            Self::ClinicalTrials => "clinical_trials",
            Self::DrugSafety => "drug_safety",
            Self::DrugInfo => "drug_info",
            Self::LiteratureReview => "literature_review",
            Self::GeneralMedical => "general_medical",
        }
    }

    /// Whether local document search is worth running alongside external sources
    pub fn wants_documents(&self) -> bool {
        matches!(self, Self::LiteratureReview | Self::GeneralMedical)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Routing decision for one query.
///
/// Built once through [`Decision::new`], which clamps the confidence into
/// `[0, 1]` and deduplicates the source list while keeping its order. There are
/// no mutators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    intent: Intent,
    confidence: f64,
    sources: Vec<SourceId>,
    reasoning: String,
    use_external: bool,
    use_documents: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<Identifier>,
}

impl Decision {
    pub fn new(
        intent: Intent,
        confidence: f64,
        sources: impl IntoIterator<Item = SourceId>,
        reasoning: impl Into<String>,
    ) -> Self {
        let mut deduped: Vec<SourceId> = Vec::new();
        for source in sources {
            if !deduped.contains(&source) {
                deduped.push(source);
            }
        }

        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            intent,
            confidence,
            use_external: !deduped.is_empty(),
            use_documents: intent.wants_documents(),
            sources: deduped,
            reasoning: reasoning.into(),
            identifier: None,
        }
    }

    pub(crate) fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn use_external(&self) -> bool {
        self.use_external
    }

    pub fn use_documents(&self) -> bool {
        self.use_documents
    }

    /// Specific identifier that short-circuited classification, if any
    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        let high = Decision::new(Intent::DrugInfo, 1.7, [SourceId::OpenFda], "x");
        assert_eq!(high.confidence(), 1.0);

        let low = Decision::new(Intent::DrugInfo, -0.2, [SourceId::OpenFda], "x");
        assert_eq!(low.confidence(), 0.0);

        let nan = Decision::new(Intent::DrugInfo, f64::NAN, [SourceId::OpenFda], "x");
        assert_eq!(nan.confidence(), 0.0);
    }

    #[test]
    fn test_sources_are_deduplicated_in_order() {
        let decision = Decision::new(
            Intent::ClinicalTrials,
            0.5,
            [SourceId::PubMed, SourceId::ClinicalTrials, SourceId::PubMed],
            "x",
        );
        assert_eq!(decision.sources(), &[SourceId::PubMed, SourceId::ClinicalTrials]);
        assert!(decision.use_external());
    }

    #[test]
    fn test_no_sources_means_no_external() {
        let decision = Decision::new(Intent::GeneralMedical, 0.6, [], "x");
        assert!(!decision.use_external());
    }

    #[test]
    fn test_serialization() {
        let decision = Decision::new(Intent::DrugSafety, 0.36, [SourceId::OpenFda], "matched");
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["intent"], "drug_safety");
        assert_eq!(json["sources"][0], "openfda");
        assert_eq!(json["use_documents"], false);
        assert!(json.get("identifier").is_none());
    }
}

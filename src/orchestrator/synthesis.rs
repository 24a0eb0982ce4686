//! Combines per-source outcomes into one answer

use crate::decision::Decision;
use crate::results::{Record, RecordSet, SourceResult};
use crate::sources::SourceId;
use std::collections::BTreeMap;

/// Confidence reported when no source produced data
pub const NO_DATA_CONFIDENCE: f64 = 0.1;

/// Records listed in the synthesis text
const LISTED_RECORDS: usize = 5;

pub struct Synthesis {
    pub text: String,
    pub records: Vec<Record>,
    pub confidence: f64,
}

/// Merge successful results and describe them.
///
/// Confidence is the decision confidence scaled by the share of selected
/// sources that succeeded.
pub fn synthesize(decision: &Decision, results: &BTreeMap<SourceId, SourceResult>) -> Synthesis {
    let mut set = RecordSet::new();
    // decision order, not map order, so the preferred source wins ties
    for source in decision.sources() {
        if let Some(result) = results.get(source) {
            set.extend_from(result);
        }
    }

    let succeeded: Vec<SourceId> = decision
        .sources()
        .iter()
        .copied()
        .filter(|s| results.get(s).is_some_and(|r| r.is_success()))
        .collect();
    let failed: Vec<String> = decision
        .sources()
        .iter()
        .filter_map(|s| results.get(s))
        .filter(|r| !r.is_success())
        .map(|r| format!("{} ({})", r.source, r.status))
        .collect();

    if succeeded.is_empty() {
        let mut text = format!(
            "No data available for this {} query.",
            decision.intent().as_str().replace('_', " ")
        );
        if !failed.is_empty() {
            text.push_str(&format!(" Unavailable: {}.", failed.join(", ")));
        }
        return Synthesis {
            text,
            records: Vec::new(),
            confidence: NO_DATA_CONFIDENCE,
        };
    }

    let records = set.ordered();
    let share = succeeded.len() as f64 / decision.sources().len() as f64;
    let confidence = (decision.confidence() * share).clamp(0.0, 1.0);

    let names: Vec<&str> = succeeded.iter().map(|s| s.as_str()).collect();
    let mut text = format!(
        "Found {} record{} from {} of {} source{} ({}).",
        records.len(),
        if records.len() == 1 { "" } else { "s" },
        succeeded.len(),
        decision.sources().len(),
        if decision.sources().len() == 1 { "" } else { "s" },
        names.join(", ")
    );

    for (i, record) in records.iter().take(LISTED_RECORDS).enumerate() {
        let sources: Vec<&str> = record.sources.iter().map(|s| s.as_str()).collect();
        text.push_str(&format!(
            "\n{}. {} [{}] {}",
            i + 1,
            record.title,
            sources.join(", "),
            record.url
        ));
    }

    if !failed.is_empty() {
        text.push_str(&format!("\nUnavailable: {}.", failed.join(", ")));
    }

    Synthesis {
        text,
        records,
        confidence,
    }
}

//! External data source module
//!
//! Defines the [`SourceClient`] trait, the registry of configured clients and
//! the concrete ClinicalTrials.gov, PubMed and openFDA clients.

mod loader;
mod registry;
mod traits;

pub mod clinical_trials;
pub mod openfda;
pub mod pubmed;

#[cfg(test)]
pub(crate) mod test_utils;

pub use loader::SourceLoader;
pub use registry::SourceRegistry;
pub use traits::*;

/// Maximum characters kept from upstream free text
pub(crate) const SUMMARY_CHARS: usize = 500;

/// Truncate to at most `max` characters, marking the cut with an ellipsis
pub(crate) fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

/// First string of a JSON array field, or the field itself when it is a string
pub(crate) fn first_str<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    let field = value.get(key)?;
    field
        .as_str()
        .or_else(|| field.as_array().and_then(|a| a.first()).and_then(|v| v.as_str()))
        .filter(|s| !s.trim().is_empty())
}

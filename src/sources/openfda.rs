//! openFDA drug label source

use super::traits::*;
use super::{first_str, truncate, SUMMARY_CHARS};
use crate::decision::Identifier;
use crate::error::SourceError;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::Record;
use async_trait::async_trait;

const LIMIT: u32 = 5;

/// Words that describe the question rather than the drug
const NOISE_WORDS: &[&str] = &[
    "adverse", "dosage", "dose", "drug", "drugs", "effect", "effects", "interaction",
    "interactions", "label", "medication", "medications", "reaction", "reactions", "risk",
    "risks", "safety", "side", "taking", "warning", "warnings",
];

/// Maximum drug-name terms combined into one search
const MAX_TERMS: usize = 3;

/// openFDA drug labeling API
pub struct OpenFda {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl OpenFda {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// openFDA search expression
    fn search(query: &Query) -> String {
        if let Some(Identifier::FdaApplication(number)) = Identifier::detect(query.text()) {
            return format!("openfda.application_number:\"{}\"", number);
        }

        let terms: Vec<String> = query
            .search_terms()
            .into_iter()
            .filter(|t| !NOISE_WORDS.contains(&t.as_str()))
            .take(MAX_TERMS)
            .collect();

        if terms.is_empty() {
            return format!("\"{}\"", query.canonical());
        }

        terms
            .iter()
            .map(|t| format!("openfda.brand_name:\"{t}\" OR openfda.generic_name:\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    pub fn request(&self, query: &Query) -> SourceRequest {
        let request = SourceRequest::get(format!("{}/drug/label.json", self.base_url))
            .param("search", Self::search(query))
            .param("limit", LIMIT.to_string());
        match &self.api_key {
            Some(key) => request.param("api_key", key.clone()),
            None => request,
        }
    }

    pub fn parse(&self, response: &SourceResponse) -> Result<Vec<Record>, SourceError> {
        // openFDA answers 404 when nothing matches
        if response.status == 404 {
            return Ok(Vec::new());
        }
        response.error_for_status()?;
        let json: serde_json::Value = response.json()?;

        let Some(results) = json.get("results").and_then(|r| r.as_array()) else {
            return Err(SourceError::Parse("missing results array".to_string()));
        };

        let mut records = Vec::new();
        for label in results {
            let Some(id) = first_str(label, "id") else {
                continue;
            };
            let openfda = label.get("openfda").cloned().unwrap_or_default();
            let brand = first_str(&openfda, "brand_name");
            let generic = first_str(&openfda, "generic_name");

            let title = match (brand, generic) {
                (Some(b), Some(g)) if !b.eq_ignore_ascii_case(g) => format!("{} ({})", b, g),
                (Some(name), _) | (None, Some(name)) => name.to_string(),
                (None, None) => format!("Drug label {}", id),
            };

            let url = match first_str(label, "set_id") {
                Some(set_id) => format!(
                    "https://dailymed.nlm.nih.gov/dailymed/lookup.cfm?setid={}",
                    set_id
                ),
                None => format!("https://api.fda.gov/drug/label.json?search=id:{}", id),
            };

            let position = records.len() as u32 + 1;
            let mut record = Record::new(id, title, url, SourceId::OpenFda).with_position(position);

            let summary = first_str(label, "boxed_warning")
                .or_else(|| first_str(label, "adverse_reactions"))
                .or_else(|| first_str(label, "warnings"))
                .or_else(|| first_str(label, "indications_and_usage"));
            if let Some(summary) = summary {
                record = record.with_summary(truncate(summary, SUMMARY_CHARS));
            }

            if let Some(date) = first_str(label, "effective_time") {
                record = record.with_published(date);
            }
            if let Some(manufacturer) = first_str(&openfda, "manufacturer_name") {
                record = record.with_attribute("manufacturer", manufacturer);
            }
            if let Some(number) = first_str(&openfda, "application_number") {
                record = record.with_attribute("application_number", number);
            }
            if label.get("boxed_warning").is_some() {
                record = record.with_attribute("boxed_warning", "true");
            }

            records.push(record);
        }

        Ok(records)
    }
}

#[async_trait]
impl SourceClient for OpenFda {
    fn id(&self) -> SourceId {
        SourceId::OpenFda
    }

    fn about(&self) -> SourceAbout {
        SourceAbout::new()
            .website("https://open.fda.gov")
            .api_key_supported(true)
            .data("drug labels, warnings and adverse reactions")
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let response = self.http.execute(self.request(query)).await?;
        self.parse(&response)
    }

    async fn ping(&self) -> Result<(), SourceError> {
        let request =
            SourceRequest::get(format!("{}/drug/label.json", self.base_url)).param("limit", "1");
        let response = self.http.execute(request).await?;
        response.error_for_status()
    }
}

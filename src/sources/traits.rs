//! Source traits and types

use crate::error::SourceError;
use crate::query::Query;
use crate::results::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Identifier of an external biomedical data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceId {
    /// ClinicalTrials.gov registry
    #[serde(rename = "clinical_trials")]
    ClinicalTrials,
    /// PubMed literature index
    #[serde(rename = "pubmed")]
    PubMed,
    /// openFDA drug label and safety data
    #[serde(rename = "openfda")]
    OpenFda,
}

impl SourceId {
    pub const ALL: [SourceId; 3] = [SourceId::ClinicalTrials, SourceId::PubMed, SourceId::OpenFda];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClinicalTrials => "clinical_trials",
            Self::PubMed => "pubmed",
            Self::OpenFda => "openfda",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clinical_trials" | "clinicaltrials" | "ctgov" => Ok(Self::ClinicalTrials),
            "pubmed" | "literature" => Ok(Self::PubMed),
            "openfda" | "fda" => Ok(Self::OpenFda),
            _ => Err(anyhow::anyhow!("Unknown source: {}", s)),
        }
    }
}

/// HTTP request to be made on behalf of a source
#[derive(Debug, Clone)]
pub struct SourceRequest {
    /// URL to request
    pub url: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Query parameters, in order
    pub params: Vec<(String, String)>,
}

impl SourceRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            params: Vec::new(),
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Look up a query parameter
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP response from a source request
#[derive(Debug)]
pub struct SourceResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub text: String,
    /// Response URL (after redirects)
    pub url: String,
}

impl SourceResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, SourceError> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response indicates rate limiting
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Convert a non-2xx status into the matching error
    pub fn error_for_status(&self) -> Result<(), SourceError> {
        if self.is_rate_limited() {
            Err(SourceError::RateLimited)
        } else if !self.is_success() {
            Err(SourceError::Http(self.status))
        } else {
            Ok(())
        }
    }
}

/// Source metadata
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceAbout {
    /// Website URL
    pub website: Option<String>,
    /// Whether an API key raises the upstream rate limit
    pub api_key_supported: bool,
    /// Kind of data the source serves
    pub data: String,
}

impl SourceAbout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn website(mut self, url: impl Into<String>) -> Self {
        self.website = Some(url.into());
        self
    }

    pub fn api_key_supported(mut self, supported: bool) -> Self {
        self.api_key_supported = supported;
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }
}

/// Client for one external data source
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Which source this client talks to
    fn id(&self) -> SourceId;

    /// Short description of the source
    fn about(&self) -> SourceAbout {
        SourceAbout::default()
    }

    /// Fetch records relevant to the query
    async fn fetch(&self, query: &Query) -> Result<Vec<Record>, SourceError>;

    /// Cheap reachability probe
    async fn ping(&self) -> Result<(), SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_round_trip() {
        for id in SourceId::ALL {
            assert_eq!(id.as_str().parse::<SourceId>().unwrap(), id);
        }
        assert_eq!("FDA".parse::<SourceId>().unwrap(), SourceId::OpenFda);
        assert!("scholar".parse::<SourceId>().is_err());
    }

    #[test]
    fn test_source_id_serde_names() {
        let json = serde_json::to_string(&SourceId::OpenFda).unwrap();
        assert_eq!(json, "\"openfda\"");
        let id: SourceId = serde_json::from_str("\"clinical_trials\"").unwrap();
        assert_eq!(id, SourceId::ClinicalTrials);
    }

    #[test]
    fn test_response_status_mapping() {
        let response = SourceResponse {
            status: 429,
            headers: HashMap::new(),
            text: String::new(),
            url: String::new(),
        };
        assert_eq!(response.error_for_status(), Err(SourceError::RateLimited));

        let response = SourceResponse { status: 502, ..response };
        assert_eq!(response.error_for_status(), Err(SourceError::Http(502)));
    }

    #[test]
    fn test_request_builder() {
        let request = SourceRequest::get("https://example.org")
            .param("q", "aspirin")
            .header("X-Test", "1");
        assert_eq!(request.param_value("q"), Some("aspirin"));
        assert_eq!(request.headers.get("X-Test").map(String::as_str), Some("1"));
    }
}

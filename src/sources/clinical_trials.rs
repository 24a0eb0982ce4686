//! ClinicalTrials.gov (API v2) source

use super::traits::*;
use super::{truncate, SUMMARY_CHARS};
use crate::decision::Identifier;
use crate::error::SourceError;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::Record;
use async_trait::async_trait;

const PAGE_SIZE: u32 = 10;

/// ClinicalTrials.gov study registry
pub struct ClinicalTrials {
    http: HttpClient,
    base_url: String,
}

impl ClinicalTrials {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Search term: the trial id when one is present, keywords otherwise
    fn term(query: &Query) -> String {
        match Identifier::detect(query.text()) {
            Some(Identifier::Trial(nct)) => nct,
            _ => query.search_terms().join(" "),
        }
    }

    pub fn request(&self, query: &Query) -> SourceRequest {
        SourceRequest::get(format!("{}/studies", self.base_url))
            .param("query.term", Self::term(query))
            .param("pageSize", PAGE_SIZE.to_string())
            .param("format", "json")
    }

    pub fn parse(&self, response: &SourceResponse) -> Result<Vec<Record>, SourceError> {
        response.error_for_status()?;
        let json: serde_json::Value = response.json()?;

        let Some(studies) = json.get("studies").and_then(|s| s.as_array()) else {
            return Err(SourceError::Parse("missing studies array".to_string()));
        };

        let mut records = Vec::new();
        for study in studies {
            let Some(protocol) = study.get("protocolSection") else {
                continue;
            };

            let identification = protocol.get("identificationModule");
            let nct_id = identification
                .and_then(|m| m.get("nctId"))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if nct_id.is_empty() {
                continue;
            }

            let title = identification
                .and_then(|m| m.get("briefTitle").or_else(|| m.get("officialTitle")))
                .and_then(|v| v.as_str())
                .unwrap_or(nct_id);

            let position = records.len() as u32 + 1;
            let mut record = Record::new(
                nct_id,
                title,
                format!("https://clinicaltrials.gov/study/{}", nct_id),
                SourceId::ClinicalTrials,
            )
            .with_position(position);

            if let Some(summary) = protocol
                .get("descriptionModule")
                .and_then(|m| m.get("briefSummary"))
                .and_then(|v| v.as_str())
            {
                record = record.with_summary(truncate(summary, SUMMARY_CHARS));
            }

            let status = protocol.get("statusModule");
            if let Some(overall) = status
                .and_then(|m| m.get("overallStatus"))
                .and_then(|v| v.as_str())
            {
                record = record.with_attribute("status", overall);
            }
            if let Some(updated) = status
                .and_then(|m| m.get("lastUpdatePostDateStruct"))
                .and_then(|d| d.get("date"))
                .and_then(|v| v.as_str())
            {
                record = record.with_published(updated);
            }

            if let Some(conditions) = protocol
                .get("conditionsModule")
                .and_then(|m| m.get("conditions"))
                .and_then(|v| v.as_array())
            {
                let conditions: Vec<&str> = conditions.iter().filter_map(|c| c.as_str()).collect();
                if !conditions.is_empty() {
                    record = record.with_attribute("conditions", conditions.join(", "));
                }
            }

            records.push(record);
        }

        Ok(records)
    }
}

#[async_trait]
impl SourceClient for ClinicalTrials {
    fn id(&self) -> SourceId {
        SourceId::ClinicalTrials
    }

    fn about(&self) -> SourceAbout {
        SourceAbout::new()
            .website("https://clinicaltrials.gov")
            .api_key_supported(false)
            .data("clinical trial registrations")
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let response = self.http.execute(self.request(query)).await?;
        self.parse(&response)
    }

    async fn ping(&self) -> Result<(), SourceError> {
        let response = self.http.get(&format!("{}/version", self.base_url)).await?;
        response.error_for_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = r#"{
        "studies": [
            {
                "protocolSection": {
                    "identificationModule": {
                        "nctId": "NCT01234567",
                        "briefTitle": "Aspirin in Heart Failure"
                    },
                    "statusModule": {
                        "overallStatus": "RECRUITING",
                        "lastUpdatePostDateStruct": {"date": "2024-03-01"}
                    },
                    "descriptionModule": {"briefSummary": "A randomized study."},
                    "conditionsModule": {"conditions": ["Heart Failure", "Hypertension"]}
                }
            },
            {"protocolSection": {"identificationModule": {}}}
        ]
    }"#;

    fn source(base: &str) -> ClinicalTrials {
        ClinicalTrials::new(HttpClient::new().unwrap(), base)
    }

    fn response(status: u16, text: &str) -> SourceResponse {
        SourceResponse {
            status,
            headers: HashMap::new(),
            text: text.to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn test_request_uses_trial_id() {
        let query = Query::new("NCT01234567 status").unwrap();
        let request = source("https://ct.example").request(&query);
        assert_eq!(request.url, "https://ct.example/studies");
        assert_eq!(request.param_value("query.term"), Some("NCT01234567"));
        assert_eq!(request.param_value("pageSize"), Some("10"));
    }

    #[test]
    fn test_request_uses_keywords() {
        let query = Query::new("recruiting trials for melanoma").unwrap();
        let request = source("https://ct.example").request(&query);
        assert_eq!(
            request.param_value("query.term"),
            Some("recruiting trials melanoma")
        );
    }

    #[test]
    fn test_parse_studies() {
        let records = source("https://ct.example").parse(&response(200, BODY)).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.id, "NCT01234567");
        assert_eq!(record.url, "https://clinicaltrials.gov/study/NCT01234567");
        assert_eq!(record.attributes.get("status").map(String::as_str), Some("RECRUITING"));
        assert_eq!(
            record.attributes.get("conditions").map(String::as_str),
            Some("Heart Failure, Hypertension")
        );
        assert_eq!(record.published.as_deref(), Some("2024-03-01"));
        assert_eq!(record.positions, vec![1]);
    }

    #[test]
    fn test_parse_errors() {
        let ct = source("https://ct.example");
        assert_eq!(ct.parse(&response(429, "")), Err(SourceError::RateLimited));
        assert_eq!(ct.parse(&response(500, "")), Err(SourceError::Http(500)));
        assert!(matches!(ct.parse(&response(200, "{}")), Err(SourceError::Parse(_))));
        assert!(matches!(ct.parse(&response(200, "<html>")), Err(SourceError::Parse(_))));
    }

    #[tokio::test]
    async fn test_fetch_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/studies"))
            .and(query_param("query.term", "NCT01234567"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let ct = source(&server.uri());
        let query = Query::new("NCT01234567 status").unwrap();
        let records = ct.fetch(&query).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(ct.ping().await.is_ok());
    }
}

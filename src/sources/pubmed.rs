//! PubMed source via NCBI E-utilities
//!
//! Two round trips: `esearch` resolves the query to PMIDs, `esummary` fetches
//! titles, journals and dates for those PMIDs.

use super::traits::*;
use super::first_str;
use crate::decision::Identifier;
use crate::error::SourceError;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::Record;
use async_trait::async_trait;

const RETMAX: u32 = 10;

/// PubMed literature index
pub struct PubMed {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl PubMed {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// NCBI key, raises the upstream limit from 3 to 10 requests per second
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// E-utilities term: field-qualified when the query names an identifier
    fn term(query: &Query) -> String {
        match Identifier::detect(query.text()) {
            Some(Identifier::Pmid(id)) => format!("{}[uid]", id),
            Some(Identifier::Pmc(id)) => format!("{}[pmcid]", id),
            Some(Identifier::Doi(doi)) => format!("{}[doi]", doi),
            Some(Identifier::Trial(nct)) => format!("{}[si]", nct),
            _ => query.search_terms().join(" "),
        }
    }

    fn with_key(&self, request: SourceRequest) -> SourceRequest {
        match &self.api_key {
            Some(key) => request.param("api_key", key.clone()),
            None => request,
        }
    }

    pub fn search_request(&self, query: &Query) -> SourceRequest {
        let request = SourceRequest::get(format!("{}/esearch.fcgi", self.base_url))
            .param("db", "pubmed")
            .param("term", Self::term(query))
            .param("retmode", "json")
            .param("retmax", RETMAX.to_string())
            .param("sort", "relevance");
        self.with_key(request)
    }

    pub fn summary_request(&self, ids: &[String]) -> SourceRequest {
        let request = SourceRequest::get(format!("{}/esummary.fcgi", self.base_url))
            .param("db", "pubmed")
            .param("id", ids.join(","))
            .param("retmode", "json");
        self.with_key(request)
    }

    /// PMIDs from an esearch response, in relevance order
    pub fn parse_search(&self, response: &SourceResponse) -> Result<Vec<String>, SourceError> {
        response.error_for_status()?;
        let json: serde_json::Value = response.json()?;

        let ids = json
            .get("esearchresult")
            .and_then(|r| r.get("idlist"))
            .and_then(|l| l.as_array())
            .ok_or_else(|| SourceError::Parse("missing esearchresult.idlist".to_string()))?;

        Ok(ids
            .iter()
            .filter_map(|id| id.as_str())
            .map(str::to_string)
            .collect())
    }

    /// Records from an esummary response, following the order of `ids`
    pub fn parse_summary(
        &self,
        response: &SourceResponse,
        ids: &[String],
    ) -> Result<Vec<Record>, SourceError> {
        response.error_for_status()?;
        let json: serde_json::Value = response.json()?;

        let result = json
            .get("result")
            .ok_or_else(|| SourceError::Parse("missing result".to_string()))?;

        let mut records = Vec::new();
        for id in ids {
            let Some(doc) = result.get(id.as_str()) else {
                continue;
            };
            if doc.get("error").is_some() {
                continue;
            }

            let title = doc
                .get("title")
                .and_then(|t| t.as_str())
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .unwrap_or(id.as_str());

            let position = records.len() as u32 + 1;
            let mut record = Record::new(
                id.as_str(),
                title,
                format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id),
                SourceId::PubMed,
            )
            .with_position(position);

            let journal = first_str(doc, "fulljournalname").or_else(|| first_str(doc, "source"));
            if let Some(journal) = journal {
                record = record.with_attribute("journal", journal);
            }
            if let Some(date) = first_str(doc, "pubdate") {
                record = record.with_published(date);
            }

            let authors: Vec<&str> = doc
                .get("authors")
                .and_then(|a| a.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|author| author.get("name").and_then(|n| n.as_str()))
                        .take(3)
                        .collect()
                })
                .unwrap_or_default();
            if !authors.is_empty() {
                record = record.with_attribute("authors", authors.join(", "));
            }

            records.push(record);
        }

        Ok(records)
    }
}

#[async_trait]
impl SourceClient for PubMed {
    fn id(&self) -> SourceId {
        SourceId::PubMed
    }

    fn about(&self) -> SourceAbout {
        SourceAbout::new()
            .website("https://pubmed.ncbi.nlm.nih.gov")
            .api_key_supported(true)
            .data("biomedical literature citations")
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        let response = self.http.execute(self.search_request(query)).await?;
        let ids = self.parse_search(&response)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.http.execute(self.summary_request(&ids)).await?;
        self.parse_summary(&response, &ids)
    }

    async fn ping(&self) -> Result<(), SourceError> {
        let request = SourceRequest::get(format!("{}/einfo.fcgi", self.base_url))
            .param("db", "pubmed")
            .param("retmode", "json");
        let response = self.http.execute(self.with_key(request)).await?;
        response.error_for_status()
    }
}

//! HTTP client for making requests to external data sources

use crate::config::OutgoingSettings;
use crate::error::SourceError;
use crate::sources::{SourceRequest, SourceResponse};
use anyhow::Result;
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;

/// HTTP client wrapper shared by every source client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout))
            .pool_max_idle_per_host(settings.pool_maxsize)
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = settings.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            default_timeout: Duration::from_secs_f64(settings.request_timeout),
            user_agent: settings.user_agent.clone(),
        })
    }

    /// Execute a source request
    pub async fn execute(&self, request: SourceRequest) -> Result<SourceResponse, SourceError> {
        self.execute_with_timeout(request, self.default_timeout).await
    }

    /// Execute a source request with custom timeout
    pub async fn execute_with_timeout(
        &self,
        request: SourceRequest,
        timeout: Duration,
    ) -> Result<SourceResponse, SourceError> {
        let mut req_builder = self
            .client
            .get(&request.url)
            .timeout(timeout)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json");

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Simple GET request
    pub async fn get(&self, url: &str) -> Result<SourceResponse, SourceError> {
        self.execute(SourceRequest::get(url)).await
    }

    /// GET request with parameters
    pub async fn get_with_params(
        &self,
        url: &str,
        params: Vec<(String, String)>,
    ) -> Result<SourceResponse, SourceError> {
        let mut request = SourceRequest::get(url);
        request.params = params;
        self.execute(request).await
    }

    async fn parse_response(response: Response) -> Result<SourceResponse, SourceError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let text = response.text().await?;

        Ok(SourceResponse {
            status,
            headers,
            text,
            url,
        })
    }

    /// Current user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

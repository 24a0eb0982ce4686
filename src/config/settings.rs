//! Settings structures for MedQuery-RS configuration

use crate::ratelimit::AcquirePolicy;
use crate::sources::SourceId;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub outgoing: OutgoingSettings,
    pub cache: CacheSettings,
    pub orchestrator: OrchestratorSettings,
    pub sources: Vec<SourceConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            server: ServerSettings::default(),
            outgoing: OutgoingSettings::default(),
            cache: CacheSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            sources: default_sources(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables
    pub fn merge_env(&mut self) {
        self.merge_vars(|name| std::env::var(name).ok());
    }

    /// Merge overrides from an arbitrary variable lookup
    pub fn merge_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = var("MEDQUERY_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Some(val) = var("MEDQUERY_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("MEDQUERY_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Some(val) = var("REDIS_URL") {
            if !val.trim().is_empty() {
                self.cache.redis_url = Some(val);
            }
        }
        if let Some(val) = var("NCBI_API_KEY") {
            self.set_api_key(SourceId::PubMed, val);
        }
        if let Some(val) = var("OPENFDA_API_KEY") {
            self.set_api_key(SourceId::OpenFda, val);
        }
    }

    fn set_api_key(&mut self, id: SourceId, key: String) {
        if let Some(source) = self.sources.iter_mut().find(|s| s.id == id) {
            source.api_key = Some(key);
        }
    }

    /// Reject settings the rest of the system cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            bail!("cache.max_entries must be at least 1");
        }
        if self.orchestrator.max_batch_size == 0 {
            bail!("orchestrator.max_batch_size must be at least 1");
        }
        if !positive(self.orchestrator.source_timeout) {
            bail!("orchestrator.source_timeout must be positive");
        }
        if !positive(self.outgoing.request_timeout) {
            bail!("outgoing.request_timeout must be positive");
        }
        if !positive(self.cache.connect_timeout) {
            bail!("cache.connect_timeout must be positive");
        }
        for source in &self.sources {
            if source.timeout.is_some_and(|t| !positive(t)) {
                bail!("source {}: timeout must be positive", source.id);
            }
            if source.rate_limit.capacity == 0 {
                bail!("source {}: rate_limit.capacity must be at least 1", source.id);
            }
            if !positive(source.rate_limit.refill_period) {
                bail!("source {}: rate_limit.refill_period must be positive", source.id);
            }
            url::Url::parse(&source.base_url)
                .map_err(|e| anyhow::anyhow!("source {}: invalid base_url: {}", source.id, e))?;
        }
        Ok(())
    }

    /// Get source config by id
    pub fn get_source(&self, id: SourceId) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Get all enabled sources
    pub fn enabled_sources(&self) -> Vec<&SourceConfig> {
        self.sources.iter().filter(|s| !s.disabled).collect()
    }
}

/// Finite and greater than zero
fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
    /// Instance name reported by the API
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "MedQuery".to_string(),
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Enable inbound rate limiter
    pub limiter: bool,
    /// Inbound requests allowed per minute
    pub requests_per_minute: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
            limiter: true,
            requests_per_minute: 120,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// User agent sent to upstream APIs
    pub user_agent: String,
    /// Proxy for all outgoing requests
    pub proxy: Option<String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10.0,
            pool_maxsize: 20,
            verify_ssl: true,
            user_agent: format!("medquery-rs/{}", crate::VERSION),
            proxy: None,
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Redis/Valkey URL; absent means in-process cache only
    pub redis_url: Option<String>,
    /// Key namespace
    pub namespace: String,
    /// In-process tier capacity
    pub max_entries: usize,
    /// Default TTL in seconds
    pub default_ttl: u64,
    /// Durable tier connect timeout in seconds
    pub connect_timeout: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            namespace: "source".to_string(),
            max_entries: 1000,
            default_ttl: crate::DEFAULT_CACHE_TTL,
            connect_timeout: 2.0,
        }
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Per-source deadline in seconds
    pub source_timeout: f64,
    /// Maximum queries per batch
    pub max_batch_size: usize,
    /// Queries processed concurrently within a batch
    pub batch_concurrency: usize,
    /// Rate limiter behaviour on an empty bucket
    pub acquire_policy: AcquirePolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            source_timeout: crate::DEFAULT_SOURCE_TIMEOUT,
            max_batch_size: crate::MAX_BATCH_SIZE,
            batch_concurrency: 5,
            acquire_policy: AcquirePolicy::default(),
        }
    }
}

/// Token bucket parameters for one source
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum burst
    pub capacity: u32,
    /// Seconds to refill an empty bucket
    pub refill_period: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            refill_period: 1.0,
        }
    }
}

/// Individual source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: SourceId,
    /// API base URL
    pub base_url: String,
    /// API key if available
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    /// Custom deadline in seconds for this source
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl SourceConfig {
    pub fn new(id: SourceId, base_url: impl Into<String>, rate_limit: RateLimitConfig) -> Self {
        Self {
            id,
            base_url: base_url.into(),
            api_key: None,
            disabled: false,
            timeout: None,
            rate_limit,
        }
    }
}

/// Default source configurations, sized to each API's published limits
fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(
            SourceId::ClinicalTrials,
            "https://clinicaltrials.gov/api/v2",
            RateLimitConfig {
                capacity: 10,
                refill_period: 1.0,
            },
        ),
        // each fetch is esearch + esummary, two calls against NCBI's 3/s
        SourceConfig::new(
            SourceId::PubMed,
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils",
            RateLimitConfig {
                capacity: 1,
                refill_period: 1.0,
            },
        ),
        SourceConfig::new(
            SourceId::OpenFda,
            "https://api.fda.gov",
            RateLimitConfig {
                capacity: 4,
                refill_period: 1.0,
            },
        ),
    ]
}

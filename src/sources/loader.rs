//! Source loader for initializing clients and rate limiters from configuration

use super::registry::SourceRegistry;
use super::traits::{SourceClient, SourceId};
use super::{clinical_trials, openfda, pubmed};
use crate::config::{SourceConfig, Settings};
use crate::network::HttpClient;
use crate::ratelimit::{RateLimiter, RateLimiterSet};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Loader for initializing sources from configuration
pub struct SourceLoader;

impl SourceLoader {
    /// Build clients for every enabled source
    pub fn load(settings: &Settings, http: &HttpClient) -> Result<SourceRegistry> {
        let mut registry = SourceRegistry::new();

        for config in &settings.sources {
            if config.disabled {
                info!("Skipping disabled source: {}", config.id);
                continue;
            }

            match Self::create_client(config, http) {
                Ok(client) => {
                    info!("Loaded source: {} ({})", config.id, config.base_url);
                    let timeout = config.timeout.map(Duration::from_secs_f64);
                    registry.register(client, timeout);
                }
                Err(e) => {
                    warn!("Failed to load source {}: {}", config.id, e);
                }
            }
        }

        info!("Loaded {} sources", registry.len());
        Ok(registry)
    }

    /// One token bucket per enabled source
    pub fn limiters(settings: &Settings) -> RateLimiterSet {
        let policy = settings.orchestrator.acquire_policy;
        settings
            .enabled_sources()
            .into_iter()
            .fold(RateLimiterSet::new(), |set, config| {
                let limiter =
                    RateLimiter::new(config.rate_limit.capacity, config.rate_limit.refill_period)
                        .with_policy(policy);
                set.with(config.id, limiter)
            })
    }

    fn create_client(config: &SourceConfig, http: &HttpClient) -> Result<Arc<dyn SourceClient>> {
        let base_url = url::Url::parse(&config.base_url)?;
        let base_url = base_url.as_str().trim_end_matches('/').to_string();
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());

        let client: Arc<dyn SourceClient> = match config.id {
            SourceId::ClinicalTrials => {
                Arc::new(clinical_trials::ClinicalTrials::new(http.clone(), base_url))
            }
            SourceId::PubMed => {
                Arc::new(pubmed::PubMed::new(http.clone(), base_url).with_api_key(api_key))
            }
            SourceId::OpenFda => {
                Arc::new(openfda::OpenFda::new(http.clone(), base_url).with_api_key(api_key))
            }
        };

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::AcquirePolicy;

    #[test]
    fn test_load_skips_disabled_sources() {
        let mut settings = Settings::default();
        settings.sources[2].disabled = true;
        settings.sources[0].timeout = Some(3.0);

        let http = HttpClient::new().unwrap();
        let registry = SourceLoader::load(&settings, &http).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(SourceId::OpenFda));
        assert_eq!(
            registry.timeout(SourceId::ClinicalTrials, Duration::from_secs(10)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_invalid_base_url_is_skipped() {
        let mut settings = Settings::default();
        settings.sources[1].base_url = "::not a url::".to_string();

        let http = HttpClient::new().unwrap();
        let registry = SourceLoader::load(&settings, &http).unwrap();
        assert!(!registry.contains(SourceId::PubMed));
    }

    #[test]
    fn test_limiters_follow_settings() {
        let mut settings = Settings::default();
        settings.orchestrator.acquire_policy = AcquirePolicy::Strict;

        let limiters = SourceLoader::limiters(&settings);
        assert_eq!(limiters.len(), 3);

        let pubmed = limiters.get(SourceId::PubMed).unwrap();
        assert_eq!(pubmed.capacity(), 1);
        assert_eq!(pubmed.policy(), AcquirePolicy::Strict);
    }
}

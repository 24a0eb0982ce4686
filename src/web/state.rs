//! Application state shared across handlers

use super::limiter::InboundLimiter;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Query orchestrator
    pub orchestrator: Arc<Orchestrator>,
    /// Inbound limiter, absent when disabled
    pub limiter: Option<Arc<InboundLimiter>>,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings, orchestrator: Orchestrator) -> Self {
        let limiter = settings
            .server
            .limiter
            .then(|| Arc::new(InboundLimiter::per_minute(settings.server.requests_per_minute)));

        Self {
            settings: Arc::new(settings),
            orchestrator: Arc::new(orchestrator),
            limiter,
        }
    }

    /// Get instance name
    pub fn instance_name(&self) -> &str {
        &self.settings.general.instance_name
    }
}

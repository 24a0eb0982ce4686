//! Source registry for managing configured data source clients

use super::traits::{SourceClient, SourceId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Registry of all configured source clients
#[derive(Default)]
pub struct SourceRegistry {
    clients: BTreeMap<SourceId, Arc<dyn SourceClient>>,
    /// Per-source deadline overrides
    timeouts: BTreeMap<SourceId, Duration>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, replacing any previous client for the same source
    pub fn register(&mut self, client: Arc<dyn SourceClient>, timeout: Option<Duration>) {
        let id = client.id();
        match timeout {
            Some(timeout) => {
                self.timeouts.insert(id, timeout);
            }
            None => {
                self.timeouts.remove(&id);
            }
        }
        self.clients.insert(id, client);
    }

    pub fn with(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.register(client, None);
        self
    }

    /// Get a client by source id
    pub fn get(&self, id: SourceId) -> Option<Arc<dyn SourceClient>> {
        self.clients.get(&id).cloned()
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Registered source ids in stable order
    pub fn ids(&self) -> Vec<SourceId> {
        self.clients.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, &Arc<dyn SourceClient>)> {
        self.clients.iter()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Effective deadline for a source
    pub fn timeout(&self, id: SourceId, default: Duration) -> Duration {
        self.timeouts.get(&id).copied().unwrap_or(default)
    }
}

//! Mock source clients shared by tests

use super::traits::{SourceClient, SourceId};
use crate::error::SourceError;
use crate::query::Query;
use crate::results::Record;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn record_for(id: SourceId, query: &Query) -> Record {
    Record::new(
        format!("{}-1", id),
        format!("{} result for {}", id, query.canonical()),
        format!("https://{}.example/{}", id, query.canonical().replace(' ', "-")),
        id,
    )
    .with_position(1)
}

/// Returns one record per query and counts calls
pub struct StaticSource {
    id: SourceId,
    calls: AtomicUsize,
    /// Queries whose canonical text contains this fail with `Http(500)`
    fail_on: Option<String>,
}

impl StaticSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for StaticSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = &self.fail_on {
            if query.canonical().contains(needle.as_str()) {
                return Err(SourceError::Http(500));
            }
        }
        Ok(vec![record_for(self.id, query)])
    }

    async fn ping(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Always fails with the given error
pub struct FailingSource {
    id: SourceId,
    error: SourceError,
}

impl FailingSource {
    pub fn new(id: SourceId, error: SourceError) -> Self {
        Self { id, error }
    }
}

#[async_trait]
impl SourceClient for FailingSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn fetch(&self, _query: &Query) -> Result<Vec<Record>, SourceError> {
        Err(self.error.clone())
    }

    async fn ping(&self) -> Result<(), SourceError> {
        Err(self.error.clone())
    }
}

/// Answers after a fixed delay
pub struct SlowSource {
    id: SourceId,
    delay: Duration,
    completed: AtomicUsize,
}

impl SlowSource {
    pub fn new(id: SourceId, delay: Duration) -> Self {
        Self {
            id,
            delay,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for SlowSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Record>, SourceError> {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(vec![record_for(self.id, query)])
    }

    async fn ping(&self) -> Result<(), SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

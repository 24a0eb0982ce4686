//! Record container for merging and deduplicating records across sources

use super::types::*;
use std::collections::HashMap;

/// Collects records from several sources, merging duplicates by URL
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    /// Normalized URL -> merged record
    records: HashMap<String, Record>,
    /// First-seen order, used to break score ties
    order: Vec<String>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every record of a successful source result
    pub fn extend_from(&mut self, result: &SourceResult) {
        if !result.is_success() {
            return;
        }
        for record in &result.records {
            self.add(record.clone());
        }
    }

    /// Add a record, merging with an existing one if the URL matches
    pub fn add(&mut self, record: Record) {
        let key = Self::url_key(&record.url, &record.id);

        if let Some(existing) = self.records.get_mut(&key) {
            existing.merge(&record);
        } else {
            self.order.push(key.clone());
            self.records.insert(key, record);
        }
    }

    /// All records sorted by score, highest first
    pub fn ordered(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .order
            .iter()
            .filter_map(|key| self.records.get(key).cloned())
            .collect();

        // stable sort keeps first-seen order for equal scores
        records.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Normalized URL used for deduplication, falling back to the record id
    fn url_key(url: &str, id: &str) -> String {
        if url.is_empty() {
            return id.to_lowercase();
        }

        url.trim_end_matches('/')
            .replace("https://", "")
            .replace("http://", "")
            .replace("www.", "")
            .to_lowercase()
    }
}

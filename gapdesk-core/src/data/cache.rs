//! Short-lived response cache for live-tier payloads.

use super::provider::FeedPayload;
use crate::domain::DataSource;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    payload: FeedPayload,
    source: DataSource,
}

/// TTL cache keyed by [`FeedRequest::cache_key`](super::provider::FeedRequest::cache_key).
///
/// Entries keep the tier tag they were fetched with, so a cache hit reports
/// the feed that actually produced the data.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<(FeedPayload, DataSource)> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<(FeedPayload, DataSource)> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(e) if now.saturating_duration_since(e.stored_at) < self.ttl => {
                Some((e.payload.clone(), e.source))
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: &str, payload: FeedPayload, source: DataSource) {
        self.insert_at(key, payload, source, Instant::now());
    }

    pub fn insert_at(&self, key: &str, payload: FeedPayload, source: DataSource, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.lock().unwrap().insert(
            key.to_string(),
            CacheEntry {
                stored_at: now,
                payload,
                source,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

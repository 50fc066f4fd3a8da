//! Per-host chain cache with a fixed time-to-live.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use crate::cert::Certificate;

#[derive(Debug, Clone)]
struct CacheEntry {
    chain: Vec<Certificate>,
    fetched_at: DateTime<Utc>,
}

/// Chains captured per host. A zero TTL disables the cache entirely.
#[derive(Debug)]
pub struct ChainCache {
    ttl: TimeDelta,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ChainCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl > TimeDelta::zero()
    }

    /// Chain for `host` if it was fetched less than one TTL before `now`.
    pub async fn get(&self, host: &str, now: DateTime<Utc>) -> Option<Vec<Certificate>> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.lock().await;
        entries
            .get(host)
            .filter(|e| now.signed_duration_since(e.fetched_at) < self.ttl)
            .map(|e| e.chain.clone())
    }

    pub async fn put(&self, host: &str, chain: Vec<Certificate>, fetched_at: DateTime<Utc>) {
        if !self.is_enabled() {
            return;
        }
        self.entries
            .lock()
            .await
            .insert(host.to_string(), CacheEntry { chain, fetched_at });
    }

    /// Drops expired entries, returns how many remain.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| now.signed_duration_since(e.fetched_at) < self.ttl);
        entries.len()
    }
}

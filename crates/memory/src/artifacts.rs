//! In-memory artifact store with bounded capacity and optional expiry.
//!
//! Eviction policy: at most `max_entries` records are kept; storing past
//! that limit evicts the oldest first. With a TTL configured, records
//! older than the TTL load as absent and are purged on the next store.
//! Ids are fresh UUIDs, so an evicted id is never handed out again.

use async_trait::async_trait;
use chrono::Utc;
use genbi_core::artifact::{ArtifactRecord, ArtifactStore, require_id, require_payload};
use genbi_core::error::ArtifactError;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_MAX_ENTRIES: usize = 256;

pub struct InMemoryArtifactStore {
    inner: RwLock<Inner>,
    max_entries: usize,
    ttl: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, ArtifactRecord>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// A store holding at most `max_entries` records (minimum 1).
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_entries: max_entries.max(1),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn is_expired(&self, record: &ArtifactRecord) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let age = (Utc::now() - record.created_at).to_std().unwrap_or_default();
        age >= ttl
    }

    /// Drop every expired record. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        // Insertion order is creation order, so expired records form a prefix.
        while let Some(id) = inner.order.front().cloned() {
            let expired = inner
                .records
                .get(&id)
                .map(|r| self.is_expired(r))
                .unwrap_or(true);
            if !expired {
                break;
            }
            inner.order.pop_front();
            inner.records.remove(&id);
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, "Purged expired artifacts");
        }
        removed
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn store(&self, payload: String) -> Result<String, ArtifactError> {
        require_payload(&payload)?;
        self.purge_expired().await;

        let record = ArtifactRecord {
            id: Uuid::new_v4().to_string(),
            payload,
            created_at: Utc::now(),
        };
        let id = record.id.clone();
        let bytes = record.payload.len();

        let mut inner = self.inner.write().await;
        inner.order.push_back(id.clone());
        inner.records.insert(id.clone(), record);

        while inner.order.len() > self.max_entries {
            if let Some(evicted) = inner.order.pop_front() {
                inner.records.remove(&evicted);
                debug!(artifact_id = %evicted, "Evicted oldest artifact");
            }
        }

        debug!(artifact_id = %id, bytes, "Stored artifact");
        Ok(id)
    }

    async fn record(&self, id: &str) -> Result<Option<ArtifactRecord>, ArtifactError> {
        require_id(id)?;
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .get(id)
            .filter(|r| !self.is_expired(r))
            .cloned())
    }

    async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}

//! Artifact store trait: bulky outputs referenced by opaque id.
//!
//! Charts are stored once and passed around as ids, keeping session
//! history and model context small. Records are immutable: stores only
//! insert, never update.

use crate::error::ArtifactError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored payload and its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Unique for the process lifetime, never reused.
    pub id: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Insert `payload` under a fresh id.
    ///
    /// Fails with [`ArtifactError::InvalidArgument`] for an empty payload.
    async fn store(&self, payload: String) -> Result<String, ArtifactError>;

    /// Look up the full record for `id`. `Ok(None)` when absent.
    async fn record(&self, id: &str) -> Result<Option<ArtifactRecord>, ArtifactError>;

    /// Look up the payload for `id`. `Ok(None)` when absent.
    ///
    /// Fails with [`ArtifactError::InvalidArgument`] for an empty id.
    async fn load(&self, id: &str) -> Result<Option<String>, ArtifactError> {
        Ok(self.record(id).await?.map(|r| r.payload))
    }

    /// Number of records currently held.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Shared precondition check for `store`.
pub fn require_payload(payload: &str) -> Result<(), ArtifactError> {
    if payload.is_empty() {
        return Err(ArtifactError::InvalidArgument("payload cannot be empty"));
    }
    Ok(())
}

/// Shared precondition check for `load`/`record`.
pub fn require_id(id: &str) -> Result<(), ArtifactError> {
    if id.is_empty() {
        return Err(ArtifactError::InvalidArgument("artifact id cannot be empty"));
    }
    Ok(())
}

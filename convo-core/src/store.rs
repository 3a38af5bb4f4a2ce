//! Persistence sink for transcript records.
//!
//! The sink only issues an upsert keyed on [`TranscriptRecord::id`]; it does
//! not compute identities itself. Two implementations exist:
//!
//! * [`DatabaseProcessor`] – PostgreSQL, `INSERT ... ON CONFLICT (id)`.
//! * [`MemoryTranscriptStore`] – in-process map with the same contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kanau::processor::Processor;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::entities::{TranscriptRecord, UpsertConversation, UpsertOutcome};
use crate::framework::DatabaseProcessor;

/// Errors that can occur while persisting a record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Upsert-by-identity contract used by the webhook.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Insert `record`, or overwrite the row with the same id.
    async fn upsert(&self, record: TranscriptRecord) -> Result<UpsertOutcome, StoreError>;
}

#[async_trait]
impl TranscriptStore for DatabaseProcessor {
    async fn upsert(&self, record: TranscriptRecord) -> Result<UpsertOutcome, StoreError> {
        Ok(self.process(UpsertConversation { record }).await?)
    }
}

/// Upsert with an optional deadline. `None` waits indefinitely.
pub async fn upsert_with_deadline(
    store: &dyn TranscriptStore,
    record: TranscriptRecord,
    deadline: Option<std::time::Duration>,
) -> Result<UpsertOutcome, StoreError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, store.upsert(record))
            .await
            .map_err(|_| StoreError::Timeout(limit))?,
        None => store.upsert(record).await,
    }
}

/// In-process store keyed by record id.
#[derive(Clone, Default)]
pub struct MemoryTranscriptStore {
    records: Arc<RwLock<BTreeMap<String, TranscriptRecord>>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<TranscriptRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// All records ordered by id.
    pub async fn records(&self) -> Vec<TranscriptRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn upsert(&self, record: TranscriptRecord) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.write().await;
        Ok(match records.insert(record.id.clone(), record) {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }
}

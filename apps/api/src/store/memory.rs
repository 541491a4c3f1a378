use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::query::ResumeQuery;
use super::{DocumentCollection, IdentityKey, StoreError, StoredDocument};

struct Entry {
    id: Uuid,
    key: String,
    data: Value,
    updated_at: DateTime<Utc>,
}

/// Process-local collection with the same upsert and query semantics as
/// the Postgres one. Documents are returned in insertion order.
#[derive(Default)]
pub struct MemoryCollection {
    entries: RwLock<Vec<Entry>>,
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn upsert_one(&self, document: &Value, key: &IdentityKey) -> Result<Uuid, StoreError> {
        let key = key.as_key();
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.iter_mut().find(|e| e.key == key) {
            existing.data = document.clone();
            existing.updated_at = Utc::now();
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        entries.push(Entry {
            id,
            key,
            data: document.clone(),
            updated_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find(&self, query: &ResumeQuery) -> Result<Vec<StoredDocument>, StoreError> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| query.matches(&e.data))
            .map(|e| -> Result<StoredDocument, StoreError> {
                Ok(StoredDocument {
                    id: e.id,
                    identity_key: e.key.clone(),
                    updated_at: e.updated_at,
                    record: serde_json::from_value(e.data.clone())?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

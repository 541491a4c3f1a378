//! Store Manager: one current document per candidate, keyed by identity.
//!
//! The key is the case-normalized email, or `name + phone` when the email is
//! missing. Records sharing a key overwrite the same document; history is not
//! kept.

pub mod memory;
pub mod postgres;
pub mod query;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::resume::CanonicalRecord;
use query::ResumeQuery;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record has no email, name or phone to identify the candidate")]
    MissingIdentity,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Upsert key for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Email(String),
    NamePhone { name: String, phone: String },
}

impl IdentityKey {
    pub fn for_record(record: &CanonicalRecord) -> Result<Self, StoreError> {
        if let Some(email) = record.email.as_deref() {
            let email = email.trim().to_lowercase();
            if !email.is_empty() {
                return Ok(IdentityKey::Email(email));
            }
        }

        let name = record
            .name
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let phone: String = record
            .phone
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();

        match (name.is_empty(), phone.is_empty()) {
            (true, true) => Err(StoreError::MissingIdentity),
            (false, true) => {
                // Known ambiguity: two people with the same name and no phone collide.
                warn!("Identifying '{name}' by name alone; same-name candidates will share a record");
                Ok(IdentityKey::NamePhone { name, phone })
            }
            _ => Ok(IdentityKey::NamePhone { name, phone }),
        }
    }

    /// Stable string form stored in the unique `identity_key` column.
    pub fn as_key(&self) -> String {
        match self {
            IdentityKey::Email(email) => format!("email:{email}"),
            IdentityKey::NamePhone { name, phone } => format!("name_phone:{name}|{phone}"),
        }
    }
}

/// A canonical record as persisted, with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: Uuid,
    pub identity_key: String,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: CanonicalRecord,
}

/// Seam to the document database. Each call is atomic on its own; there is
/// no transaction spanning calls.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Inserts `document`, or fully replaces the document holding `key`.
    /// Returns the id of the document that now holds `key`.
    async fn upsert_one(&self, document: &Value, key: &IdentityKey) -> Result<Uuid, StoreError>;

    async fn find(&self, query: &ResumeQuery) -> Result<Vec<StoredDocument>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct StoreManager {
    collection: Arc<dyn DocumentCollection>,
}

impl StoreManager {
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self { collection }
    }

    pub async fn upsert(&self, record: &CanonicalRecord) -> Result<Uuid, StoreError> {
        let key = IdentityKey::for_record(record)?;
        let document = serde_json::to_value(record)?;
        let id = self.collection.upsert_one(&document, &key).await?;
        info!("Upserted resume {id} ({})", key.as_key());
        Ok(id)
    }

    pub async fn find(&self, query: &ResumeQuery) -> Result<Vec<StoredDocument>, StoreError> {
        self.collection.find(query).await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.collection.ping().await
    }
}

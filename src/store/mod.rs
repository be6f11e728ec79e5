//! Document persistence: the store seam, its implementations, and the repository that
//! turns profiles and exam records into documents.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::{ExamRecord, UserProfile};

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

pub const USERS: &str = "users";
pub const EXAM_RESULTS: &str = "exam_results";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store transport error: {0}")]
    Transport(String),
    #[error("document store rejected request: {0}")]
    Backend(String),
    #[error("document encoding error: {0}")]
    Encoding(String),
}

/// Opaque put/get document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write `doc` under `collection/id`, replacing whatever was there.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;
    /// Create a new document with a store-assigned id and return that id.
    async fn add(&self, collection: &str, doc: Value) -> Result<String, StoreError>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;
    fn describe(&self) -> String;
}

/// Typed access to the two collections the service writes.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Upsert: the whole profile document is replaced, never merged.
    #[instrument(level = "info", skip(self, profile), fields(uid = %profile.uid))]
    pub async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let doc = serde_json::to_value(profile).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.store.set(USERS, &profile.uid, doc).await?;
        info!(target: "store", uid = %profile.uid, "Profile stored");
        Ok(())
    }

    #[cfg(test)]
    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        match self.store.get(USERS, uid).await? {
            Some(doc) => {
                let mut profile: UserProfile =
                    serde_json::from_value(doc).map_err(|e| StoreError::Encoding(e.to_string()))?;
                profile.uid = uid.to_string();
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Append one immutable exam record; returns its store-assigned id.
    #[instrument(level = "info", skip(self, record), fields(user_id = %record.user_id, module = %record.module))]
    pub async fn append_exam_record(&self, record: &ExamRecord) -> Result<String, StoreError> {
        let doc = serde_json::to_value(record).map_err(|e| StoreError::Encoding(e.to_string()))?;
        let id = self.store.add(EXAM_RESULTS, doc).await?;
        info!(target: "store", %id, "Exam record stored");
        Ok(id)
    }

    #[cfg(test)]
    pub async fn get_exam_record(&self, id: &str) -> Result<Option<ExamRecord>, StoreError> {
        self.store
            .get(EXAM_RESULTS, id)
            .await?
            .map(|doc| serde_json::from_value(doc).map_err(|e| StoreError::Encoding(e.to_string())))
            .transpose()
    }

    pub fn describe(&self) -> String {
        self.store.describe()
    }
}

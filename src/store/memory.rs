//! In-process document store. Default backend for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections.read().await.get(collection).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().insert(id.to_string(), doc);
        Ok(())
    }

    async fn add(&self, collection: &str, doc: Value) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(collection, &id, doc).await?;
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ampfhir_core::{Record, ResourceType};
use ampfhir_storage::{StorageError, StoredRecord};
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::index::ReferenceIndex;

pub type StorageKey = String; // Format: "ResourceType/id"

pub(crate) fn make_storage_key(resource_type: ResourceType, id: &str) -> StorageKey {
    format!("{resource_type}/{id}")
}

/// Counters of repository calls, for observing query volume per decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    pub reads: u64,
    pub searches: u64,
    pub writes: u64,
}

/// In-memory record repository using papaya lock-free HashMap.
///
/// Record reads are lock-free. The reference index sits behind an async
/// `RwLock`; writes hold it while swapping the record so a search never sees
/// an index entry for content that is not stored.
#[derive(Debug)]
pub struct InMemoryStorage {
    pub(crate) data: Arc<PapayaHashMap<StorageKey, StoredRecord>>,
    pub(crate) index: Arc<RwLock<ReferenceIndex>>,
    version_counter: AtomicU64,
    reads: AtomicU64,
    searches: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryStorage {
    /// Creates a new, empty in-memory repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            index: Arc::new(RwLock::new(ReferenceIndex::default())),
            version_counter: AtomicU64::new(1),
            reads: AtomicU64::new(0),
            searches: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Generates the next version ID.
    pub(crate) fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> RepositoryStats {
        RepositoryStats {
            reads: self.reads.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `resource`, assigning an id if it has none, and re-indexes it.
    pub async fn put(&self, resource: &Value) -> Result<StoredRecord, StorageError> {
        let mut resource = resource.clone();
        if resource.get("id").and_then(Value::as_str).is_none() {
            let obj = resource
                .as_object_mut()
                .ok_or_else(|| StorageError::invalid_resource("resource must be a JSON object"))?;
            obj.insert(
                "id".to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }

        let record = Record::from_value(resource)
            .map_err(|e| StorageError::invalid_resource(e.to_string()))?;
        let id = record
            .id()
            .ok_or_else(|| StorageError::invalid_resource("missing id"))?
            .to_string();
        let resource_type = record.resource_type();
        let key = make_storage_key(resource_type, &id);

        let stored = StoredRecord::new(
            id,
            self.next_version(),
            resource_type.as_str(),
            record.resource().clone(),
        );

        let mut index = self.index.write().await;
        let previous = self.data.pin().insert(key, stored.clone()).cloned();
        if let Some(previous) = previous.and_then(|p| p.to_record().ok()) {
            index.remove(&previous);
        }
        index.insert(&record);
        self.writes.fetch_add(1, Ordering::Relaxed);

        Ok(stored)
    }

    /// Removes a record; returns `true` if it existed.
    pub async fn remove(&self, resource_type: ResourceType, id: &str) -> bool {
        let key = make_storage_key(resource_type, id);
        let mut index = self.index.write().await;
        let removed = self.data.pin().remove(&key).cloned();
        match removed {
            Some(stored) => {
                if let Ok(record) = stored.to_record() {
                    index.remove(&record);
                }
                self.writes.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_assigns_id_and_version() {
        let storage = InMemoryStorage::new();
        let stored = storage
            .put(&json!({"resourceType": "Patient"}))
            .await
            .unwrap();

        assert!(!stored.id.is_empty());
        assert_eq!(stored.resource["id"], json!(stored.id));
        assert_eq!(stored.resource_type, "Patient");
        assert_eq!(storage.len(), 1);

        let again = storage.put(&stored.resource).await.unwrap();
        assert_ne!(again.version_id, stored.version_id);
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_unknown_type() {
        let storage = InMemoryStorage::new();
        let err = storage
            .put(&json!({"resourceType": "Encounter", "id": "e1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidResource { .. }));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let storage = InMemoryStorage::new();
        storage
            .put(&json!({"resourceType": "Organization", "id": "1"}))
            .await
            .unwrap();

        assert!(storage.remove(ResourceType::Organization, "1").await);
        assert!(!storage.remove(ResourceType::Organization, "1").await);
        assert_eq!(storage.stats().writes, 2);
    }
}

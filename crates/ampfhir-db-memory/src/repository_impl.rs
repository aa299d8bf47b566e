//! Implementation of the RecordRepository trait for InMemoryStorage.

use async_trait::async_trait;
use serde_json::Value;

use ampfhir_core::{FhirReference, ResourceType};
use ampfhir_storage::{RecordRepository, StorageError, StoredRecord};

use crate::storage::{InMemoryStorage, make_storage_key};

/// Resolves a search parameter name to the indexed parameter of the type.
fn indexed_param(
    resource_type: ResourceType,
    search_param: &str,
) -> Result<&'static str, StorageError> {
    resource_type
        .reference_fields()
        .iter()
        .find(|field| field.search_param == search_param)
        .map(|field| field.search_param)
        .ok_or_else(|| StorageError::unsupported_search_param(resource_type.as_str(), search_param))
}

#[async_trait]
impl RecordRepository for InMemoryStorage {
    async fn read(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        self.record_read();
        let key = make_storage_key(resource_type, id);
        let guard = self.data.pin();
        Ok(guard.get(&key).cloned())
    }

    async fn search_by_reference(
        &self,
        resource_type: ResourceType,
        search_param: &str,
        references: &[FhirReference],
    ) -> Result<Vec<String>, StorageError> {
        let param = indexed_param(resource_type, search_param)?;
        self.record_search();
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().await;
        Ok(index
            .lookup(resource_type, param, references)
            .into_iter()
            .collect())
    }

    async fn update(&self, resource: &Value) -> Result<StoredRecord, StorageError> {
        self.put(resource).await
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

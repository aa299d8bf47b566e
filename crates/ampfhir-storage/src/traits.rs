//! Repository trait consumed by the authorization core.

use ampfhir_core::{FhirReference, ResourceType};
use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::StoredRecord;

/// Record repository capability required by compartment authorization.
///
/// Implementations must be thread-safe (`Send + Sync`) and own their own
/// synchronization; the authorization core holds no shared mutable state and
/// calls into the repository concurrently. Returned futures must be safe to
/// drop mid-flight: dropping is how an enclosing request cancels a query.
///
/// # Example
///
/// ```ignore
/// use ampfhir_storage::{RecordRepository, StorageError, StoredRecord};
///
/// async fn get_patient(repo: &dyn RecordRepository, id: &str) -> Result<StoredRecord, StorageError> {
///     repo.read(ResourceType::Patient, id)
///         .await?
///         .ok_or_else(|| StorageError::not_found("Patient", id))
/// }
/// ```
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Reads a record by type and ID.
    ///
    /// Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing records.
    async fn read(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<Option<StoredRecord>, StorageError>;

    /// Returns the ids of `resource_type` records whose `search_param`
    /// reference element holds any of `references`.
    ///
    /// Multi-valued elements match if any of their values matches. Backends
    /// must answer from an index keyed by reference, never by scanning every
    /// record of the type. An empty `references` slice matches nothing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnsupportedSearchParam` if the parameter is not
    /// indexed, and an error for infrastructure issues.
    async fn search_by_reference(
        &self,
        resource_type: ResourceType,
        search_param: &str,
        references: &[FhirReference],
    ) -> Result<Vec<String>, StorageError>;

    /// Creates or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidResource` if the record is malformed.
    async fn update(&self, resource: &serde_json::Value) -> Result<StoredRecord, StorageError>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

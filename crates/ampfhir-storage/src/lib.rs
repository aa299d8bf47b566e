//! # ampfhir-storage
//!
//! Record repository abstraction consumed by the ampfhir authorization core.
//!
//! The authorization core never stores or indexes anything itself. It reads
//! single records and asks the repository for ids of records whose reference
//! element points at one of a set of references. Backends implement
//! [`RecordRepository`]; `ampfhir-db-memory` provides an in-memory one.
//!
//! ## Example
//!
//! ```ignore
//! use ampfhir_core::{FhirReference, ResourceType};
//! use ampfhir_storage::{RecordRepository, StorageError};
//!
//! async fn requested_by(
//!     repo: &dyn RecordRepository,
//!     org: &str,
//! ) -> Result<Vec<String>, StorageError> {
//!     let orgs = [FhirReference::of(ResourceType::Organization, org)];
//!     repo.search_by_reference(ResourceType::ServiceRequest, "requester", &orgs)
//!         .await
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::RecordRepository;
pub use types::StoredRecord;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable repository trait object.
pub type DynRepository = std::sync::Arc<dyn RecordRepository>;

//! In-memory record repository for ampfhir.
//!
//! This crate provides an in-memory implementation of the `RecordRepository`
//! trait from `ampfhir-storage`, using papaya lock-free HashMap for record
//! access and a reference index for `search_by_reference`.
//!
//! # Example
//!
//! ```ignore
//! use ampfhir_db_memory::InMemoryStorage;
//! use ampfhir_storage::RecordRepository;
//!
//! let storage = InMemoryStorage::new();
//! storage.update(&serde_json::json!({
//!     "resourceType": "Patient",
//!     "id": "p1",
//!     "managingOrganization": {"reference": "Organization/1"}
//! })).await?;
//! ```

mod index;
mod repository_impl;
pub mod storage;

pub use ampfhir_storage::{RecordRepository, StorageError, StoredRecord};

pub use storage::{InMemoryStorage, RepositoryStats, StorageKey};

// ID handling for records and organizational tenants
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fhir::ResourceType;
use crate::fhir_reference::FhirReference;

static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-.]{1,64}$").expect("id pattern is a valid regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid ID: {0:?}")]
    Invalid(String),
}

/// Validates a logical id against the FHIR `id` datatype.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(IdError::Invalid(id.to_string()))
    }
}

/// Opaque identifier of an organizational tenant, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgRef(String);

impl OrgRef {
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self(id))
    }

    /// Builds an `OrgRef` from a reference, if it points at an Organization.
    pub fn from_reference(reference: &FhirReference) -> Option<Self> {
        if reference.is_type(ResourceType::Organization) {
            Self::new(reference.id.clone()).ok()
        } else {
            None
        }
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn to_reference(&self) -> FhirReference {
        FhirReference::of(ResourceType::Organization, self.0.clone())
    }
}

impl fmt::Display for OrgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Organization/{}", self.0)
    }
}

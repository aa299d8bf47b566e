//! Request context for compartment authorization.
//!
//! # Usage
//!
//! ```ignore
//! use ampfhir_auth::policy::context::{AuthRequest, Operation, Target};
//! use ampfhir_core::ResourceType;
//!
//! let request = AuthRequest::new(Operation::Read, ResourceType::Patient)
//!     .with_target(Target::id("p1"))
//!     .with_authorization("Bearer eyJhbGciOi...");
//! ```

use std::collections::BTreeSet;
use std::fmt;

use ampfhir_core::{FhirReference, OrgRef, ResourceType};
use serde_json::Value;

// =============================================================================
// Operation
// =============================================================================

/// Operation requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Capability statement.
    Metadata,
    /// Next page of an already narrowed search.
    GetPage,
    /// Type-level search or list.
    Search,
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// Returns `true` for operations that change a stored record.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::GetPage => "get-page",
            Self::Search => "search",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Target
// =============================================================================

/// The record an instance operation acts on.
///
/// Read and Delete carry an id, Create a body, Update both: the stored record
/// is found by id and the incoming body is checked for the read-only lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    pub id: Option<String>,
    pub body: Option<Value>,
}

impl Target {
    /// No target (search, metadata, paging).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            body: None,
        }
    }

    #[must_use]
    pub fn body(body: Value) -> Self {
        Self {
            id: None,
            body: Some(body),
        }
    }

    /// Adds the incoming body to an id target.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

// =============================================================================
// Organization Set
// =============================================================================

/// Organizations a caller acts for, after validation against the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgSet(BTreeSet<OrgRef>);

impl OrgSet {
    #[must_use]
    pub fn new(organizations: impl IntoIterator<Item = OrgRef>) -> Self {
        Self(organizations.into_iter().collect())
    }

    #[must_use]
    pub fn contains(&self, organization: &OrgRef) -> bool {
        self.0.contains(organization)
    }

    /// Returns `true` if `reference` names one of the organizations.
    #[must_use]
    pub fn contains_reference(&self, reference: &FhirReference) -> bool {
        OrgRef::from_reference(reference).is_some_and(|org| self.0.contains(&org))
    }

    /// Returns `true` if `id` is the id of one of the organizations.
    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.0.iter().any(|org| org.id() == id)
    }

    /// References to every organization, in id order.
    #[must_use]
    pub fn references(&self) -> Vec<FhirReference> {
        self.0.iter().map(OrgRef::to_reference).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrgRef> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<OrgRef> for OrgSet {
    fn from_iter<I: IntoIterator<Item = OrgRef>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// =============================================================================
// Auth Request
// =============================================================================

/// One incoming request, as seen by the authorizer.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub operation: Operation,
    /// `None` for system-level operations such as metadata.
    pub resource_type: Option<ResourceType>,
    pub target: Target,
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
}

impl AuthRequest {
    #[must_use]
    pub fn new(operation: Operation, resource_type: ResourceType) -> Self {
        Self {
            operation,
            resource_type: Some(resource_type),
            target: Target::none(),
            authorization: None,
        }
    }

    /// A request with no resource type.
    #[must_use]
    pub fn system(operation: Operation) -> Self {
        Self {
            operation,
            resource_type: None,
            target: Target::none(),
            authorization: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }
}

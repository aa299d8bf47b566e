//! Instance decision engine.
//!
//! Decides a single-record operation (create, read, update, delete) for a
//! caller acting for a validated organization set. The procedure is an
//! ordered sequence of guards; the first one reaching a verdict wins:
//!
//! 1. Administrators are allowed everything.
//! 2. Metadata and paging are allowed (paging continues a narrowed search).
//! 3. Searches are allowed here; restricting them is the narrowing filter's job.
//! 4. Creates are allowed for originating types, and for types tied to a
//!    ServiceRequest unless every ServiceRequest they are based on is read-only.
//! 5. Reads and writes require the stored record to be in the caller's
//!    compartment, with extra conditions for locked updates and Media deletes.
//!
//! # Example
//!
//! ```ignore
//! use ampfhir_auth::policy::{DecisionEngine, Operation, Target};
//!
//! let engine = DecisionEngine::new(resolver);
//! let decision = engine
//!     .decide(Operation::Read, ResourceType::Patient, &Target::id("p1"), &orgs, false)
//!     .await?;
//! if decision.is_allowed() {
//!     // Proceed with request
//! }
//! ```

use futures_util::future::try_join_all;
use serde::Serialize;

use ampfhir_core::{CommunicationStatus, Record, ResourceType};
use ampfhir_storage::StorageError;

use super::context::{Operation, OrgSet, Target};
use super::reachability::ReachabilityResolver;

// =============================================================================
// Access Decision
// =============================================================================

/// Outcome of an instance decision.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    /// Access is granted.
    Allow,
    /// Access is denied with a reason.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            Self::Allow => None,
        }
    }
}

// =============================================================================
// Deny Reason
// =============================================================================

/// Reason for access denial.
///
/// Messages are short and never describe other tenants' records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    /// Error code for programmatic handling.
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

impl DenyReason {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The record is outside the caller's compartment.
    #[must_use]
    pub fn not_in_compartment() -> Self {
        Self::new("not-in-compartment", "Access denied")
    }

    /// The record does not exist.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new("not-found", "Access denied")
    }

    /// Every ServiceRequest the record depends on is completed or on hold.
    #[must_use]
    pub fn read_only() -> Self {
        Self::new("read-only", "corresponding ServiceRequest is read-only")
    }

    /// Media may only be deleted by the sender of a Communication in preparation.
    #[must_use]
    pub fn media_not_deletable() -> Self {
        Self::new(
            "delete-not-allowed",
            "Media can only be deleted by the sender of a Communication in preparation",
        )
    }

    /// The operation is never allowed on this record type.
    #[must_use]
    pub fn operation_not_allowed(operation: Operation, resource_type: ResourceType) -> Self {
        Self::new(
            "operation-not-allowed",
            format!("{operation} is not allowed on {resource_type}"),
        )
    }

    /// The request does not carry what the operation needs.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid-request", message)
    }

    /// Search narrowing found no visible record.
    #[must_use]
    pub fn no_authorization() -> Self {
        Self::new("no-authorization", "No authorization for accessing resources")
    }
}

// =============================================================================
// Decision Engine
// =============================================================================

/// Decides single-record operations against the caller's compartment.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    resolver: ReachabilityResolver,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(resolver: ReachabilityResolver) -> Self {
        Self { resolver }
    }

    #[must_use]
    pub fn resolver(&self) -> &ReachabilityResolver {
        &self.resolver
    }

    /// Decides `operation` on `resource_type` for a caller acting for `orgs`.
    ///
    /// A record that does not exist is denied, not reported as an error.
    ///
    /// # Errors
    ///
    /// Returns the repository error of any failing query; it is never turned
    /// into a denial.
    #[tracing::instrument(
        skip_all,
        fields(operation = %operation, resource_type = %resource_type, org_count = orgs.len())
    )]
    pub async fn decide(
        &self,
        operation: Operation,
        resource_type: ResourceType,
        target: &Target,
        orgs: &OrgSet,
        is_admin: bool,
    ) -> Result<AccessDecision, StorageError> {
        if is_admin {
            tracing::debug!("Administrator bypass");
            return Ok(AccessDecision::Allow);
        }

        let decision = match operation {
            Operation::Metadata | Operation::GetPage | Operation::Search => AccessDecision::Allow,
            Operation::Create => self.decide_create(resource_type, target).await?,
            Operation::Read | Operation::Update | Operation::Delete => {
                self.decide_instance(operation, resource_type, target, orgs)
                    .await?
            }
        };

        match &decision {
            AccessDecision::Allow => tracing::debug!("Access allowed"),
            AccessDecision::Deny(reason) => {
                tracing::warn!(code = %reason.code, "Access denied");
            }
        }
        Ok(decision)
    }

    async fn decide_create(
        &self,
        resource_type: ResourceType,
        target: &Target,
    ) -> Result<AccessDecision, StorageError> {
        match resource_type {
            ResourceType::Patient
            | ResourceType::Observation
            | ResourceType::Coverage
            | ResourceType::ServiceRequest => Ok(AccessDecision::Allow),
            locked if locked.is_service_request_locked() => {
                let record = match incoming_record(resource_type, target) {
                    Ok(record) => record,
                    Err(reason) => return Ok(AccessDecision::Deny(reason)),
                };
                if self.is_locked(&record).await? {
                    Ok(AccessDecision::Deny(DenyReason::read_only()))
                } else {
                    Ok(AccessDecision::Allow)
                }
            }
            other => Ok(AccessDecision::Deny(DenyReason::operation_not_allowed(
                Operation::Create,
                other,
            ))),
        }
    }

    async fn decide_instance(
        &self,
        operation: Operation,
        resource_type: ResourceType,
        target: &Target,
        orgs: &OrgSet,
    ) -> Result<AccessDecision, StorageError> {
        let Some(id) = target.id.as_deref() else {
            return Ok(AccessDecision::Deny(DenyReason::invalid_request(
                "missing record id",
            )));
        };

        let Some(stored) = self.resolver.repository().read(resource_type, id).await? else {
            return Ok(AccessDecision::Deny(DenyReason::not_found()));
        };

        // Any organization may be read; only its own members may change it.
        if resource_type == ResourceType::Organization {
            return Ok(if !operation.is_write() || orgs.contains_id(id) {
                AccessDecision::Allow
            } else {
                AccessDecision::Deny(DenyReason::not_in_compartment())
            });
        }
        let record = match stored.to_record() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Stored record is unreadable");
                return Ok(AccessDecision::Deny(DenyReason::not_found()));
            }
        };

        if !self.resolver.is_member(orgs, &record).await? {
            return Ok(AccessDecision::Deny(DenyReason::not_in_compartment()));
        }

        if operation == Operation::Update && resource_type.is_service_request_locked() {
            if self.is_locked(&record).await? {
                return Ok(AccessDecision::Deny(DenyReason::read_only()));
            }
            if target.body.is_some() {
                let incoming = match incoming_record(resource_type, target) {
                    Ok(incoming) => incoming,
                    Err(reason) => return Ok(AccessDecision::Deny(reason)),
                };
                if self.is_locked(&incoming).await? {
                    return Ok(AccessDecision::Deny(DenyReason::read_only()));
                }
            }
        }

        if operation == Operation::Delete
            && resource_type == ResourceType::Media
            && !self.is_media_deletable(&record, orgs).await?
        {
            return Ok(AccessDecision::Deny(DenyReason::media_not_deletable()));
        }

        Ok(AccessDecision::Allow)
    }

    /// Returns `true` if `record` is based on ServiceRequests and every one
    /// of them is read-only. A ServiceRequest that cannot be found counts as
    /// read-only.
    async fn is_locked(&self, record: &Record) -> Result<bool, StorageError> {
        let based_on = record.references_to("basedOn", ResourceType::ServiceRequest);
        if based_on.is_empty() {
            return Ok(false);
        }

        let repository = self.resolver.repository();
        let reads = based_on
            .iter()
            .map(|reference| repository.read(ResourceType::ServiceRequest, &reference.id));
        let service_requests = try_join_all(reads).await?;

        Ok(service_requests.iter().all(|stored| match stored {
            None => true,
            Some(stored) => stored
                .to_record()
                .ok()
                .and_then(|record| record.service_request_status())
                .is_some_and(|status| status.is_read_only()),
        }))
    }

    /// Returns `true` if some Communication the Media is part of was sent by
    /// one of `orgs` and is still in preparation.
    async fn is_media_deletable(&self, media: &Record, orgs: &OrgSet) -> Result<bool, StorageError> {
        let part_of = media.references_to("partOf", ResourceType::Communication);
        if part_of.is_empty() {
            return Ok(false);
        }

        let repository = self.resolver.repository();
        let reads = part_of
            .iter()
            .map(|reference| repository.read(ResourceType::Communication, &reference.id));
        let communications = try_join_all(reads).await?;

        Ok(communications
            .into_iter()
            .flatten()
            .filter_map(|stored| stored.to_record().ok())
            .any(|communication| {
                communication.communication_status() == Some(CommunicationStatus::Preparation)
                    && communication
                        .references("sender")
                        .iter()
                        .any(|sender| orgs.contains_reference(sender))
            }))
    }
}

/// Parses the request body, which must be a record of `resource_type`.
fn incoming_record(resource_type: ResourceType, target: &Target) -> Result<Record, DenyReason> {
    let body = target
        .body
        .as_ref()
        .ok_or_else(|| DenyReason::invalid_request("missing resource body"))?;
    let record = Record::from_value(body.clone())
        .map_err(|e| DenyReason::invalid_request(e.to_string()))?;
    if record.resource_type() != resource_type {
        return Err(DenyReason::invalid_request(format!(
            "resource body is not a {resource_type}"
        )));
    }
    Ok(record)
}

//! Search narrowing.
//!
//! Turns a caller's organization set into the id restriction a search of one
//! record type must run under. An empty compartment fails closed: the search
//! is denied instead of running unrestricted.

use std::collections::BTreeSet;

use ampfhir_core::ResourceType;
use ampfhir_storage::StorageError;

use super::context::OrgSet;
use super::engine::DenyReason;
use super::reachability::{Compartment, ReachabilityResolver};
use crate::config::NarrowingConfig;

/// Restriction a search must run under.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizedList {
    /// No restriction.
    Unrestricted,
    /// Only these ids may be returned.
    Restricted(Compartment),
    /// The caller may not see any record of the type.
    Denied(DenyReason),
}

impl AuthorizedList {
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    /// The permitted ids, if restricted.
    #[must_use]
    pub fn ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Restricted(compartment) => Some(compartment.ids()),
            _ => None,
        }
    }

    /// Returns `true` if a record with `id` may appear in the results.
    #[must_use]
    pub fn permits(&self, id: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Restricted(compartment) => compartment.contains(id),
            Self::Denied(_) => false,
        }
    }

    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Denied(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Computes search restrictions from compartments.
#[derive(Debug, Clone)]
pub struct SearchNarrowingFilter {
    resolver: ReachabilityResolver,
    unrestricted_types: Vec<ResourceType>,
}

impl SearchNarrowingFilter {
    #[must_use]
    pub fn new(resolver: ReachabilityResolver, config: &NarrowingConfig) -> Self {
        Self {
            resolver,
            unrestricted_types: config.unrestricted_types.clone(),
        }
    }

    /// Restriction for a search of `resource_type` by a caller acting for
    /// `orgs`. Repeated calls over unchanged data return identical results.
    ///
    /// # Errors
    ///
    /// Returns the repository error of any failing query. A partial
    /// compartment is never returned.
    #[tracing::instrument(
        skip_all,
        fields(resource_type = %resource_type, org_count = orgs.len())
    )]
    pub async fn narrow(
        &self,
        resource_type: ResourceType,
        orgs: &OrgSet,
        is_admin: bool,
    ) -> Result<AuthorizedList, StorageError> {
        if is_admin || self.unrestricted_types.contains(&resource_type) {
            tracing::debug!(is_admin, "Search unrestricted");
            return Ok(AuthorizedList::Unrestricted);
        }

        let compartment = self.resolver.reachable_ids(orgs, resource_type).await?;
        if compartment.is_empty() {
            tracing::warn!("No visible records, denying search");
            return Ok(AuthorizedList::Denied(DenyReason::no_authorization()));
        }

        tracing::debug!(compartment_size = compartment.len(), "Search narrowed");
        Ok(AuthorizedList::Restricted(compartment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ampfhir_core::OrgRef;
    use ampfhir_db_memory::InMemoryStorage;
    use ampfhir_storage::RecordRepository;
    use serde_json::json;

    fn orgs(ids: &[&str]) -> OrgSet {
        ids.iter().map(|id| OrgRef::new(*id).unwrap()).collect()
    }

    async fn filter() -> SearchNarrowingFilter {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .update(&json!({"resourceType": "Patient", "id": "p1",
                            "managingOrganization": {"reference": "Organization/a"}}))
            .await
            .unwrap();
        SearchNarrowingFilter::new(
            ReachabilityResolver::new(storage),
            &NarrowingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_restricted() {
        let list = filter()
            .await
            .narrow(ResourceType::Patient, &orgs(&["a"]), false)
            .await
            .unwrap();
        assert!(list.permits("p1"));
        assert!(!list.permits("p2"));
        assert_eq!(list.ids().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_compartment_is_denied() {
        let list = filter()
            .await
            .narrow(ResourceType::Patient, &orgs(&["b"]), false)
            .await
            .unwrap();
        assert!(list.is_denied());
        assert!(!list.is_unrestricted());
        assert_eq!(list.deny_reason().unwrap().code, "no-authorization");
        assert!(!list.permits("p1"));
    }

    #[tokio::test]
    async fn test_unrestricted_types_and_admin() {
        let filter = filter().await;
        let list = filter
            .narrow(ResourceType::Organization, &orgs(&["b"]), false)
            .await
            .unwrap();
        assert!(list.is_unrestricted());

        let list = filter
            .narrow(ResourceType::Coverage, &OrgSet::default(), true)
            .await
            .unwrap();
        assert!(list.is_unrestricted());
        assert!(list.ids().is_none());
    }
}

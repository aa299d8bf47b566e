//! Reachability resolution over the record reference graph.
//!
//! Two questions are answered against current repository state:
//!
//! - [`ReachabilityResolver::reachable_ids`]: every id of a type reachable
//!   from an organization set, computed with indexed reference searches
//!   (one per edge), never by scanning a record table.
//! - [`ReachabilityResolver::is_member`]: whether one given record is
//!   reachable, walking only the path needed to justify it.
//!
//! Both follow the same rules from [`compartment`](super::compartment), so
//! an id is in `reachable_ids` exactly when `is_member` holds for its record.
//! Nothing is cached between calls. Repository failures propagate; an empty
//! compartment means no record is reachable.

use std::collections::{BTreeMap, BTreeSet};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};

use ampfhir_core::{FhirReference, Record, ResourceType};
use ampfhir_storage::{DynRepository, StorageError};

use super::compartment::{self, ReachabilityRule};
use super::context::OrgSet;

// =============================================================================
// Compartment
// =============================================================================

/// Ids of one record type reachable from an organization set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compartment {
    resource_type: ResourceType,
    ids: BTreeSet<String>,
}

impl Compartment {
    #[must_use]
    pub fn new(resource_type: ResourceType, ids: BTreeSet<String>) -> Self {
        Self { resource_type, ids }
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Reachable ids, in sorted order.
    #[must_use]
    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// `Type/id` references to every reachable record.
    #[must_use]
    pub fn references(&self) -> Vec<FhirReference> {
        self.ids
            .iter()
            .map(|id| FhirReference::of(self.resource_type, id.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn into_ids(self) -> BTreeSet<String> {
        self.ids
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Computes compartments and compartment membership.
#[derive(Clone)]
pub struct ReachabilityResolver {
    repository: DynRepository,
}

impl std::fmt::Debug for ReachabilityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachabilityResolver")
            .field("backend", &self.repository.backend_name())
            .finish()
    }
}

impl ReachabilityResolver {
    #[must_use]
    pub fn new(repository: DynRepository) -> Self {
        Self { repository }
    }

    #[must_use]
    pub fn repository(&self) -> &DynRepository {
        &self.repository
    }

    /// All ids of `resource_type` reachable from `orgs`.
    ///
    /// Upstream compartments are computed first, each once. Queries for the
    /// edges of one type run concurrently; the first failure aborts the call.
    ///
    /// # Errors
    ///
    /// Returns the repository error of any failing query.
    #[tracing::instrument(skip_all, fields(resource_type = %resource_type, org_count = orgs.len()))]
    pub async fn reachable_ids(
        &self,
        orgs: &OrgSet,
        resource_type: ResourceType,
    ) -> Result<Compartment, StorageError> {
        let mut known: BTreeMap<ResourceType, BTreeSet<String>> = BTreeMap::new();
        known.insert(
            ResourceType::Organization,
            orgs.iter().map(|org| org.id().to_string()).collect(),
        );

        for current in compartment::evaluation_order(resource_type) {
            let ids = self.resolve_type(current, &known).await?;
            tracing::trace!(resource_type = %current, count = ids.len(), "Resolved compartment");
            known.insert(current, ids);
        }

        let ids = known.remove(&resource_type).unwrap_or_default();
        tracing::debug!(compartment_size = ids.len(), "Compartment resolved");
        Ok(Compartment::new(resource_type, ids))
    }

    async fn resolve_type(
        &self,
        resource_type: ResourceType,
        known: &BTreeMap<ResourceType, BTreeSet<String>>,
    ) -> Result<BTreeSet<String>, StorageError> {
        let mut queries: Vec<BoxFuture<'_, Result<Vec<String>, StorageError>>> = Vec::new();

        for rule in compartment::rules(resource_type) {
            let Some(field) = rule.field(resource_type) else {
                continue;
            };
            let Some(upstream) = rule.upstream(resource_type) else {
                continue;
            };
            let upstream_ids = known.get(&upstream).filter(|ids| !ids.is_empty());
            let Some(upstream_ids) = upstream_ids else {
                continue;
            };

            match *rule {
                ReachabilityRule::Forward { .. } => {
                    let references: Vec<FhirReference> = upstream_ids
                        .iter()
                        .map(|id| FhirReference::of(upstream, id.clone()))
                        .collect();
                    let repository = &self.repository;
                    queries.push(
                        async move {
                            tracing::trace!(
                                resource_type = %resource_type,
                                search_param = field.search_param,
                                references = references.len(),
                                "Searching by reference"
                            );
                            repository
                                .search_by_reference(resource_type, field.search_param, &references)
                                .await
                        }
                        .boxed(),
                    );
                }
                ReachabilityRule::Reverse { source, element } => {
                    queries.push(
                        self.referenced_by(source, upstream_ids, element, resource_type)
                            .boxed(),
                    );
                }
            }
        }

        let results = try_join_all(queries).await?;
        Ok(results.into_iter().flatten().collect())
    }

    /// Ids of `target` records referenced by `element` of the `source`
    /// records named in `source_ids`.
    async fn referenced_by(
        &self,
        source: ResourceType,
        source_ids: &BTreeSet<String>,
        element: &'static str,
        target: ResourceType,
    ) -> Result<Vec<String>, StorageError> {
        let reads = source_ids
            .iter()
            .map(|id| self.repository.read(source, id));
        let stored = try_join_all(reads).await?;

        Ok(stored
            .into_iter()
            .flatten()
            .filter_map(|stored| match stored.to_record() {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, id = %stored.id, "Skipping unreadable stored record");
                    None
                }
            })
            .flat_map(|record| record.references_to(element, target))
            .map(|reference| reference.id)
            .collect())
    }

    /// Returns `true` if `record` is reachable from `orgs`.
    ///
    /// Rules are tried in order and the first one that holds settles it, so
    /// direct organization references are checked before any walk.
    ///
    /// # Errors
    ///
    /// Returns the repository error of any failing query.
    pub async fn is_member(&self, orgs: &OrgSet, record: &Record) -> Result<bool, StorageError> {
        self.record_membership(orgs, record).await
    }

    /// Returns `true` if the record `resource_type/id` is reachable from
    /// `orgs`.
    ///
    /// A record that does not exist can still be reachable through a reverse
    /// edge (another reachable record references it), matching what
    /// [`reachable_ids`](Self::reachable_ids) reports.
    ///
    /// # Errors
    ///
    /// Returns the repository error of any failing query.
    pub async fn is_member_by_id(
        &self,
        orgs: &OrgSet,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<bool, StorageError> {
        self.id_membership(orgs, resource_type, id).await
    }

    fn id_membership<'a>(
        &'a self,
        orgs: &'a OrgSet,
        resource_type: ResourceType,
        id: &'a str,
    ) -> BoxFuture<'a, Result<bool, StorageError>> {
        async move {
            if resource_type == ResourceType::Organization {
                return Ok(orgs.contains_id(id));
            }

            let stored = self.repository.read(resource_type, id).await?;
            match stored.map(|stored| stored.to_record()) {
                Some(Ok(record)) => self.record_membership(orgs, &record).await,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, id = %id, "Stored record is unreadable");
                    Ok(false)
                }
                None => {
                    let reference = FhirReference::of(resource_type, id);
                    for rule in compartment::rules(resource_type) {
                        let ReachabilityRule::Reverse { source, .. } = *rule else {
                            continue;
                        };
                        if self
                            .referenced_by_member(orgs, *rule, resource_type, source, &reference)
                            .await?
                        {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            }
        }
        .boxed()
    }

    fn record_membership<'a>(
        &'a self,
        orgs: &'a OrgSet,
        record: &'a Record,
    ) -> BoxFuture<'a, Result<bool, StorageError>> {
        async move {
            let resource_type = record.resource_type();
            if resource_type == ResourceType::Organization {
                return Ok(record.id().is_some_and(|id| orgs.contains_id(id)));
            }

            for rule in compartment::rules(resource_type) {
                let Some(field) = rule.field(resource_type) else {
                    continue;
                };

                let holds = match *rule {
                    ReachabilityRule::Forward { element } => {
                        let mut holds = false;
                        for reference in record.references_to(element, field.target) {
                            if self.id_membership(orgs, field.target, &reference.id).await? {
                                holds = true;
                                break;
                            }
                        }
                        holds
                    }
                    ReachabilityRule::Reverse { source, .. } => match record.reference() {
                        Some(reference) => {
                            self.referenced_by_member(orgs, *rule, resource_type, source, &reference)
                                .await?
                        }
                        None => false,
                    },
                };

                if holds {
                    tracing::trace!(
                        resource_type = %resource_type,
                        element = field.element,
                        "Membership established"
                    );
                    return Ok(true);
                }
            }

            Ok(false)
        }
        .boxed()
    }

    /// Returns `true` if some reachable `source` record references
    /// `reference` through the reverse `rule`.
    async fn referenced_by_member(
        &self,
        orgs: &OrgSet,
        rule: ReachabilityRule,
        owner: ResourceType,
        source: ResourceType,
        reference: &FhirReference,
    ) -> Result<bool, StorageError> {
        let Some(field) = rule.field(owner) else {
            return Ok(false);
        };

        let source_ids = self
            .repository
            .search_by_reference(source, field.search_param, std::slice::from_ref(reference))
            .await?;

        for source_id in &source_ids {
            if self.id_membership(orgs, source, source_id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

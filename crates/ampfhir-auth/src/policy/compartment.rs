//! Organization compartment rules.
//!
//! A record belongs to the compartment of an organization set if it can be
//! reached from those organizations along typed reference edges. Each record
//! type lists the edges that make its records reachable:
//!
//! - **Forward**: the record's own `element` references a reachable record
//!   (e.g. a DiagnosticReport whose `basedOn` ServiceRequest is reachable).
//! - **Reverse**: the record is referenced by `element` of a reachable record
//!   of another type (e.g. a Patient named as `subject` of a reachable
//!   ServiceRequest).
//!
//! The rules form an acyclic graph rooted at `Organization`. Communication
//! is reached through its sender, recipients and ServiceRequests only; its
//! `subject` feeds Patient reachability instead, which keeps the graph free
//! of cycles.

use ampfhir_core::{ReferenceField, ResourceType};

// =============================================================================
// Reachability Rule
// =============================================================================

/// One edge making records of a type reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityRule {
    /// Records whose `element` references a reachable record.
    Forward { element: &'static str },
    /// Records referenced by `element` of reachable `source` records.
    Reverse {
        source: ResourceType,
        element: &'static str,
    },
}

impl ReachabilityRule {
    /// The reference field carrying the edge.
    ///
    /// Forward edges are fields of `owner`; reverse edges are fields of the
    /// source type.
    #[must_use]
    pub fn field(&self, owner: ResourceType) -> Option<&'static ReferenceField> {
        match self {
            Self::Forward { element } => owner.reference_field(element),
            Self::Reverse { source, element } => source.reference_field(element),
        }
    }

    /// The type whose reachable records this edge starts from.
    #[must_use]
    pub fn upstream(&self, owner: ResourceType) -> Option<ResourceType> {
        match self {
            Self::Forward { .. } => self.field(owner).map(|field| field.target),
            Self::Reverse { source, .. } => Some(*source),
        }
    }
}

const fn forward(element: &'static str) -> ReachabilityRule {
    ReachabilityRule::Forward { element }
}

const fn reverse(source: ResourceType, element: &'static str) -> ReachabilityRule {
    ReachabilityRule::Reverse { source, element }
}

// Direct edges come first so instance checks settle on them before walking.

const ENDPOINT_RULES: &[ReachabilityRule] = &[reverse(ResourceType::Organization, "endpoint")];

const PATIENT_RULES: &[ReachabilityRule] = &[
    forward("managingOrganization"),
    reverse(ResourceType::ServiceRequest, "subject"),
    reverse(ResourceType::Communication, "subject"),
];

const SERVICE_REQUEST_RULES: &[ReachabilityRule] = &[forward("requester"), forward("performer")];

const COMMUNICATION_RULES: &[ReachabilityRule] =
    &[forward("sender"), forward("recipient"), forward("basedOn")];

const COMMUNICATION_REQUEST_RULES: &[ReachabilityRule] = &[forward("sender"), forward("recipient")];

const DIAGNOSTIC_REPORT_RULES: &[ReachabilityRule] = &[forward("basedOn")];

const MEDIA_RULES: &[ReachabilityRule] = &[forward("basedOn"), forward("partOf")];

const OBSERVATION_RULES: &[ReachabilityRule] = &[forward("subject")];

const COVERAGE_RULES: &[ReachabilityRule] = &[forward("policyHolder")];

/// Reachability rules of `resource_type`.
///
/// `Organization` has none: its compartment is the organization set itself.
#[must_use]
pub fn rules(resource_type: ResourceType) -> &'static [ReachabilityRule] {
    match resource_type {
        ResourceType::Organization => &[],
        ResourceType::Endpoint => ENDPOINT_RULES,
        ResourceType::Patient => PATIENT_RULES,
        ResourceType::ServiceRequest => SERVICE_REQUEST_RULES,
        ResourceType::Communication => COMMUNICATION_RULES,
        ResourceType::CommunicationRequest => COMMUNICATION_REQUEST_RULES,
        ResourceType::DiagnosticReport => DIAGNOSTIC_REPORT_RULES,
        ResourceType::Media => MEDIA_RULES,
        ResourceType::Observation => OBSERVATION_RULES,
        ResourceType::Coverage => COVERAGE_RULES,
    }
}

/// Types whose compartments must be known before `resource_type`'s, followed
/// by `resource_type` itself, each exactly once and in dependency order.
/// `Organization` is never included.
#[must_use]
pub fn evaluation_order(resource_type: ResourceType) -> Vec<ResourceType> {
    fn visit(resource_type: ResourceType, order: &mut Vec<ResourceType>) {
        if resource_type == ResourceType::Organization || order.contains(&resource_type) {
            return;
        }
        for rule in rules(resource_type) {
            if let Some(upstream) = rule.upstream(resource_type) {
                visit(upstream, order);
            }
        }
        order.push(resource_type);
    }

    let mut order = Vec::new();
    visit(resource_type, &mut order);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_rule_names_a_reference_field() {
        for resource_type in ResourceType::ALL {
            for rule in rules(resource_type) {
                let field = rule
                    .field(resource_type)
                    .unwrap_or_else(|| panic!("{resource_type}: {rule:?} has no field"));
                if let ReachabilityRule::Reverse { .. } = rule {
                    assert_eq!(field.target, resource_type, "{rule:?}");
                }
            }
        }
    }

    #[test]
    fn test_direct_rules_come_first() {
        for resource_type in ResourceType::ALL {
            let direct: Vec<bool> = rules(resource_type)
                .iter()
                .map(|rule| rule.upstream(resource_type) == Some(ResourceType::Organization))
                .collect();
            let mut sorted = direct.clone();
            sorted.sort_by(|a, b| b.cmp(a));
            assert_eq!(direct, sorted, "{resource_type}");
        }
    }

    #[test]
    fn test_evaluation_order_is_topological() {
        for resource_type in ResourceType::ALL {
            let order = evaluation_order(resource_type);
            assert!(!order.contains(&ResourceType::Organization));
            if resource_type != ResourceType::Organization {
                assert_eq!(order.last(), Some(&resource_type));
            }
            for (position, current) in order.iter().enumerate() {
                for rule in rules(*current) {
                    let upstream = rule.upstream(*current).unwrap();
                    if upstream != ResourceType::Organization {
                        let before = order.iter().position(|t| *t == upstream).unwrap();
                        assert!(before < position, "{upstream} after {current}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_observation_order() {
        assert_eq!(
            evaluation_order(ResourceType::Observation),
            vec![
                ResourceType::ServiceRequest,
                ResourceType::Communication,
                ResourceType::Patient,
                ResourceType::Observation,
            ]
        );
        assert!(evaluation_order(ResourceType::Organization).is_empty());
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::CoreError;

/// Record types that take part in compartment authorization.
///
/// The set is closed: every type carries a static table of its
/// authorization-relevant reference fields (see [`ResourceType::reference_fields`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Organization,
    Endpoint,
    Patient,
    ServiceRequest,
    Communication,
    CommunicationRequest,
    DiagnosticReport,
    Media,
    Observation,
    Coverage,
}

/// A reference element of a record type that links it to another record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    /// JSON element name inside the resource (e.g. `managingOrganization`).
    pub element: &'static str,
    /// Search parameter the repository indexes the element under.
    pub search_param: &'static str,
    /// Type of the referenced record.
    pub target: ResourceType,
    /// Whether the element may hold several references (any-match).
    pub multiple: bool,
}

const fn field(
    element: &'static str,
    search_param: &'static str,
    target: ResourceType,
    multiple: bool,
) -> ReferenceField {
    ReferenceField {
        element,
        search_param,
        target,
        multiple,
    }
}

const ORGANIZATION_FIELDS: &[ReferenceField] =
    &[field("endpoint", "endpoint", ResourceType::Endpoint, true)];

const PATIENT_FIELDS: &[ReferenceField] = &[field(
    "managingOrganization",
    "organization",
    ResourceType::Organization,
    false,
)];

const SERVICE_REQUEST_FIELDS: &[ReferenceField] = &[
    field("requester", "requester", ResourceType::Organization, false),
    field("performer", "performer", ResourceType::Organization, true),
    field("subject", "subject", ResourceType::Patient, false),
];

const COMMUNICATION_FIELDS: &[ReferenceField] = &[
    field("sender", "sender", ResourceType::Organization, false),
    field("recipient", "recipient", ResourceType::Organization, true),
    field("subject", "subject", ResourceType::Patient, false),
    field("basedOn", "based-on", ResourceType::ServiceRequest, true),
];

const COMMUNICATION_REQUEST_FIELDS: &[ReferenceField] = &[
    field("sender", "sender", ResourceType::Organization, false),
    field("recipient", "recipient", ResourceType::Organization, true),
    field("basedOn", "based-on", ResourceType::ServiceRequest, true),
];

const DIAGNOSTIC_REPORT_FIELDS: &[ReferenceField] =
    &[field("basedOn", "based-on", ResourceType::ServiceRequest, true)];

const MEDIA_FIELDS: &[ReferenceField] = &[
    field("partOf", "part-of", ResourceType::Communication, true),
    field("basedOn", "based-on", ResourceType::ServiceRequest, true),
];

const OBSERVATION_FIELDS: &[ReferenceField] =
    &[field("subject", "subject", ResourceType::Patient, false)];

const COVERAGE_FIELDS: &[ReferenceField] = &[field(
    "policyHolder",
    "policy-holder",
    ResourceType::Patient,
    false,
)];

impl ResourceType {
    /// Every supported record type.
    pub const ALL: [ResourceType; 10] = [
        ResourceType::Organization,
        ResourceType::Endpoint,
        ResourceType::Patient,
        ResourceType::ServiceRequest,
        ResourceType::Communication,
        ResourceType::CommunicationRequest,
        ResourceType::DiagnosticReport,
        ResourceType::Media,
        ResourceType::Observation,
        ResourceType::Coverage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Organization => "Organization",
            ResourceType::Endpoint => "Endpoint",
            ResourceType::Patient => "Patient",
            ResourceType::ServiceRequest => "ServiceRequest",
            ResourceType::Communication => "Communication",
            ResourceType::CommunicationRequest => "CommunicationRequest",
            ResourceType::DiagnosticReport => "DiagnosticReport",
            ResourceType::Media => "Media",
            ResourceType::Observation => "Observation",
            ResourceType::Coverage => "Coverage",
        }
    }

    /// Reference fields of this type that are edges of the reachability graph.
    pub fn reference_fields(&self) -> &'static [ReferenceField] {
        match self {
            ResourceType::Organization => ORGANIZATION_FIELDS,
            ResourceType::Endpoint => &[],
            ResourceType::Patient => PATIENT_FIELDS,
            ResourceType::ServiceRequest => SERVICE_REQUEST_FIELDS,
            ResourceType::Communication => COMMUNICATION_FIELDS,
            ResourceType::CommunicationRequest => COMMUNICATION_REQUEST_FIELDS,
            ResourceType::DiagnosticReport => DIAGNOSTIC_REPORT_FIELDS,
            ResourceType::Media => MEDIA_FIELDS,
            ResourceType::Observation => OBSERVATION_FIELDS,
            ResourceType::Coverage => COVERAGE_FIELDS,
        }
    }

    /// Looks up a reference field by its JSON element name.
    pub fn reference_field(&self, element: &str) -> Option<&'static ReferenceField> {
        self.reference_fields().iter().find(|f| f.element == element)
    }

    /// Types whose writes are locked while their `basedOn` ServiceRequest is read-only.
    pub fn is_service_request_locked(&self) -> bool {
        matches!(
            self,
            ResourceType::Communication
                | ResourceType::CommunicationRequest
                | ResourceType::DiagnosticReport
                | ResourceType::Media
        )
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::invalid_resource_type(s))
    }
}

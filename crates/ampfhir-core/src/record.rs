use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::fhir::ResourceType;
use crate::fhir_reference::{FhirReference, parse_reference};

/// Lifecycle status of a ServiceRequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceRequestStatus {
    Draft,
    Active,
    OnHold,
    Revoked,
    Completed,
    EnteredInError,
    Unknown,
}

impl ServiceRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::OnHold => "on-hold",
            Self::Revoked => "revoked",
            Self::Completed => "completed",
            Self::EnteredInError => "entered-in-error",
            Self::Unknown => "unknown",
        }
    }

    /// A completed or on-hold request no longer accepts dependent writes.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Completed | Self::OnHold)
    }
}

impl fmt::Display for ServiceRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceRequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "on-hold" => Ok(Self::OnHold),
            "revoked" => Ok(Self::Revoked),
            "completed" => Ok(Self::Completed),
            "entered-in-error" => Ok(Self::EnteredInError),
            "unknown" => Ok(Self::Unknown),
            _ => Err(CoreError::unknown_status("ServiceRequest", s)),
        }
    }
}

/// Lifecycle status of a Communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommunicationStatus {
    Preparation,
    InProgress,
    NotDone,
    OnHold,
    Stopped,
    Completed,
    EnteredInError,
    Unknown,
}

impl CommunicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparation => "preparation",
            Self::InProgress => "in-progress",
            Self::NotDone => "not-done",
            Self::OnHold => "on-hold",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::EnteredInError => "entered-in-error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CommunicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommunicationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "preparation" => Ok(Self::Preparation),
            "in-progress" => Ok(Self::InProgress),
            "not-done" => Ok(Self::NotDone),
            "on-hold" => Ok(Self::OnHold),
            "stopped" => Ok(Self::Stopped),
            "completed" => Ok(Self::Completed),
            "entered-in-error" => Ok(Self::EnteredInError),
            "unknown" => Ok(Self::Unknown),
            _ => Err(CoreError::unknown_status("Communication", s)),
        }
    }
}

/// Typed view over a JSON resource for authorization purposes.
///
/// Only the resource type, id, status and reference elements are interpreted;
/// the remaining content is carried along untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    resource_type: ResourceType,
    id: Option<String>,
    resource: Value,
}

impl Record {
    /// Wraps a JSON resource. The `id` may be absent for create bodies.
    pub fn from_value(resource: Value) -> Result<Self> {
        let type_name = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid_resource("missing resourceType"))?;
        let resource_type = type_name.parse::<ResourceType>()?;
        let id = resource.get("id").and_then(Value::as_str).map(String::from);

        Ok(Self {
            resource_type,
            id,
            resource,
        })
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn resource(&self) -> &Value {
        &self.resource
    }

    /// Reference to this record, if it has an id.
    pub fn reference(&self) -> Option<FhirReference> {
        self.id
            .as_ref()
            .map(|id| FhirReference::of(self.resource_type, id.clone()))
    }

    /// Raw `status` element.
    pub fn status(&self) -> Option<&str> {
        self.resource.get("status").and_then(Value::as_str)
    }

    pub fn service_request_status(&self) -> Option<ServiceRequestStatus> {
        self.status().and_then(|s| s.parse().ok())
    }

    pub fn communication_status(&self) -> Option<CommunicationStatus> {
        self.status().and_then(|s| s.parse().ok())
    }

    /// All resolvable references held by `element`.
    ///
    /// Handles both single (`{"reference": ..}`) and repeating elements.
    /// Absent, empty, contained or malformed references are skipped, so they
    /// never match anything.
    pub fn references(&self, element: &str) -> Vec<FhirReference> {
        match self.resource.get(element) {
            Some(Value::Array(items)) => items.iter().filter_map(reference_value).collect(),
            Some(item) => reference_value(item).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// References held by `element` that point at records of `target`.
    pub fn references_to(&self, element: &str, target: ResourceType) -> Vec<FhirReference> {
        self.references(element)
            .into_iter()
            .filter(|r| r.is_type(target))
            .collect()
    }
}

fn reference_value(item: &Value) -> Option<FhirReference> {
    let raw = item.get("reference").and_then(Value::as_str)?;
    parse_reference(raw, None).ok().map(FhirReference::unversioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_value() {
        let record = Record::from_value(json!({
            "resourceType": "ServiceRequest",
            "id": "sr1",
            "status": "completed",
            "requester": {"reference": "Organization/1"},
            "performer": [
                {"reference": "Organization/2"},
                {"reference": "Organization/3/_history/4"},
                {"display": "no reference here"}
            ]
        }))
        .unwrap();

        assert_eq!(record.resource_type(), ResourceType::ServiceRequest);
        assert_eq!(record.id(), Some("sr1"));
        assert_eq!(record.reference().unwrap().to_relative(), "ServiceRequest/sr1");
        assert_eq!(
            record.service_request_status(),
            Some(ServiceRequestStatus::Completed)
        );

        let performers = record.references("performer");
        assert_eq!(performers.len(), 2);
        assert_eq!(performers[1], FhirReference::new("Organization", "3"));
        assert_eq!(record.references("requester").len(), 1);
        assert!(record.references("subject").is_empty());
    }

    #[test]
    fn test_record_rejects_unknown_type() {
        let err = Record::from_value(json!({"resourceType": "Encounter", "id": "e1"}));
        assert!(matches!(err, Err(CoreError::InvalidResourceType(_))));

        let err = Record::from_value(json!({"id": "e1"}));
        assert!(matches!(err, Err(CoreError::InvalidResource { .. })));
    }

    #[test]
    fn test_references_to_filters_by_target() {
        let record = Record::from_value(json!({
            "resourceType": "Media",
            "basedOn": [{"reference": "ServiceRequest/1"}, {"reference": "CarePlan/2"}],
            "partOf": [{"reference": "#contained"}]
        }))
        .unwrap();

        assert_eq!(record.id(), None);
        assert_eq!(
            record.references_to("basedOn", ResourceType::ServiceRequest),
            vec![FhirReference::new("ServiceRequest", "1")]
        );
        assert!(record.references("partOf").is_empty());
    }

    #[test]
    fn test_status_parsing() {
        assert!(ServiceRequestStatus::OnHold.is_read_only());
        assert!(ServiceRequestStatus::Completed.is_read_only());
        assert!(!ServiceRequestStatus::Active.is_read_only());
        assert_eq!(
            "Preparation".parse::<CommunicationStatus>().unwrap(),
            CommunicationStatus::Preparation
        );
        assert!("bogus".parse::<ServiceRequestStatus>().is_err());
    }
}

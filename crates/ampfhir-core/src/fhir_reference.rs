//! FHIR Reference parsing utilities.
//!
//! Reference elements are the edges of the authorization graph, so every
//! reference value read from a record goes through [`parse_reference`] before
//! it is compared against a compartment.
//!
//! # Reference Formats
//!
//! - Relative: `Patient/123`
//! - Versioned: `Patient/123/_history/1`
//! - Absolute URL: `http://example.org/fhir/Patient/123`
//! - Contained: `#contained-id` (cannot be resolved externally)
//! - URN: `urn:uuid:xxx` or `urn:oid:xxx` (cannot be resolved externally)
//!
//! # Example
//!
//! ```
//! use ampfhir_core::fhir_reference::parse_reference;
//!
//! let reference = parse_reference("ServiceRequest/42/_history/3", None).unwrap();
//! assert_eq!(reference.resource_type, "ServiceRequest");
//! assert_eq!(reference.id, "42");
//! assert_eq!(reference.version, Some("3".to_string()));
//! ```

use std::fmt;

use crate::fhir::ResourceType;

/// A local reference, `Type/id` with an optional version.
///
/// The type is kept as a string: references to types outside
/// [`ResourceType`] parse fine and simply never match a reference field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FhirReference {
    pub resource_type: String,
    pub id: String,
    pub version: Option<String>,
}

impl FhirReference {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            version: None,
        }
    }

    /// Creates a reference to a record of a known type.
    pub fn of(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self::new(resource_type.as_str(), id)
    }

    /// Returns `true` if the reference points at a record of `resource_type`.
    pub fn is_type(&self, resource_type: ResourceType) -> bool {
        self.resource_type == resource_type.as_str()
    }

    /// Drops the `_history` part; authorization never distinguishes versions.
    pub fn unversioned(mut self) -> Self {
        self.version = None;
        self
    }

    /// `Type/id`, without the version.
    pub fn to_relative(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

impl fmt::Display for FhirReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// Why a reference string does not name a record on this server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvableReference {
    /// `#id`, pointing into the enclosing resource.
    Contained(String),
    /// `urn:uuid:..` or `urn:oid:..`.
    Urn(String),
    /// Absolute URL outside the configured base.
    External(String),
    Invalid(String),
}

impl fmt::Display for UnresolvableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contained(id) => write!(f, "contained reference: #{id}"),
            Self::Urn(urn) => write!(f, "URN reference: {urn}"),
            Self::External(url) => write!(f, "external reference: {url}"),
            Self::Invalid(reason) => write!(f, "invalid reference: {reason}"),
        }
    }
}

impl std::error::Error for UnresolvableReference {}

/// Parses a reference string into `Type/id[/_history/version]`.
///
/// Absolute URLs resolve only when they start with `base_url`. Anything that
/// does not name a record on this server is an [`UnresolvableReference`],
/// so it can never place a record in a compartment.
pub fn parse_reference(
    reference: &str,
    base_url: Option<&str>,
) -> Result<FhirReference, UnresolvableReference> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(UnresolvableReference::Invalid("empty reference".into()));
    }
    if let Some(contained) = reference.strip_prefix('#') {
        return Err(UnresolvableReference::Contained(contained.into()));
    }
    if reference.starts_with("urn:") {
        return Err(UnresolvableReference::Urn(reference.into()));
    }

    let path = if reference.contains("://") {
        base_url
            .and_then(|base| reference.strip_prefix(base.trim_end_matches('/')))
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| UnresolvableReference::External(reference.into()))?
    } else {
        reference
    };

    let mut segments = path.split('/');
    let (Some(resource_type), Some(id)) = (segments.next(), segments.next()) else {
        return Err(UnresolvableReference::Invalid(format!(
            "expected Type/id, got {reference}"
        )));
    };
    if !resource_type.starts_with(|c: char| c.is_ascii_uppercase()) {
        return Err(UnresolvableReference::Invalid(format!(
            "not a record type: {resource_type}"
        )));
    }
    if id.is_empty() {
        return Err(UnresolvableReference::Invalid(format!(
            "empty id in {reference}"
        )));
    }

    let version = match (segments.next(), segments.next()) {
        (Some("_history"), Some(version)) => Some(version.to_string()),
        _ => None,
    };

    Ok(FhirReference {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_relative_reference() {
        let r = parse_reference("Organization/1", None).unwrap();
        assert_eq!(r.resource_type, "Organization");
        assert_eq!(r.id, "1");
        assert_eq!(r.version, None);
        assert!(r.is_type(ResourceType::Organization));
    }

    #[test]
    fn test_versioned_reference_unversioned_matches_plain() {
        let r = parse_reference("Patient/123/_history/2", None).unwrap();
        assert_eq!(r.version, Some("2".to_string()));
        assert_eq!(r.unversioned(), FhirReference::of(ResourceType::Patient, "123"));
    }

    #[test]
    fn test_absolute_url_with_matching_base() {
        let r = parse_reference(
            "http://localhost:8080/fhir/ServiceRequest/9",
            Some("http://localhost:8080/fhir/"),
        )
        .unwrap();
        assert_eq!(r.resource_type, "ServiceRequest");
        assert_eq!(r.id, "9");
    }

    #[test]
    fn test_absolute_url_without_base_is_external() {
        let result = parse_reference("http://localhost:8080/fhir/Patient/123", None);
        assert!(matches!(result, Err(UnresolvableReference::External(_))));
    }

    #[test]
    fn test_foreign_server_is_external() {
        let result = parse_reference(
            "http://other-server.com/fhir/Organization/1",
            Some("http://localhost:8080/fhir"),
        );
        assert!(matches!(result, Err(UnresolvableReference::External(_))));
    }

    #[test]
    fn test_contained_and_urn_unresolvable() {
        assert!(matches!(
            parse_reference("#org", None),
            Err(UnresolvableReference::Contained(id)) if id == "org"
        ));
        assert!(matches!(
            parse_reference("urn:uuid:550e8400-e29b-41d4-a716-446655440000", None),
            Err(UnresolvableReference::Urn(_))
        ));
    }

    #[test]
    fn test_invalid_references() {
        for input in ["", "  ", "Patient/", "Patient123", "patient/123"] {
            assert!(
                matches!(parse_reference(input, None), Err(UnresolvableReference::Invalid(_))),
                "expected {input:?} to be invalid"
            );
        }
    }

    #[test]
    fn test_display() {
        let r = FhirReference::of(ResourceType::Media, "m1");
        assert_eq!(format!("{r}"), "Media/m1");
    }
}

pub mod error;
pub mod fhir;
pub mod fhir_reference;
pub mod id;
pub mod record;

pub use error::{CoreError, Result};
pub use fhir::{ReferenceField, ResourceType};
pub use fhir_reference::{FhirReference, UnresolvableReference, parse_reference};
pub use id::{IdError, OrgRef, validate_id};
pub use record::{CommunicationStatus, Record, ServiceRequestStatus};

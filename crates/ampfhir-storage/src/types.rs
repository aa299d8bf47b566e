//! Records as the repository returns them.

use ampfhir_core::{CoreError, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// One stored version of a record.
///
/// `resource_type` is the raw type name; [`to_record`](Self::to_record)
/// checks it against the supported types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub version_id: String,
    pub resource_type: String,
    pub resource: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl StoredRecord {
    /// Stamps the record with the current time.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        version_id: impl Into<String>,
        resource_type: impl Into<String>,
        resource: Value,
    ) -> Self {
        Self {
            id: id.into(),
            version_id: version_id.into(),
            resource_type: resource_type.into(),
            resource,
            last_updated: OffsetDateTime::now_utc(),
        }
    }

    /// Typed view of the stored content.
    pub fn to_record(&self) -> Result<Record, CoreError> {
        Record::from_value(self.resource.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ampfhir_core::ResourceType;
    use serde_json::json;

    #[test]
    fn test_stored_record_to_record() {
        let stored = StoredRecord::new(
            "p1",
            "1",
            "Patient",
            json!({"resourceType": "Patient", "id": "p1"}),
        );
        let record = stored.to_record().unwrap();
        assert_eq!(record.resource_type(), ResourceType::Patient);
        assert_eq!(record.id(), Some("p1"));
    }
}

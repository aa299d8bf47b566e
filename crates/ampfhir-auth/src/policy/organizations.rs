//! Validation of claimed organizations against the repository.

use futures_util::future::try_join_all;

use ampfhir_core::{OrgRef, ResourceType};
use ampfhir_storage::RecordRepository;

use super::context::OrgSet;
use crate::AuthResult;
use crate::error::AuthError;

/// Keeps the claimed organizations that exist in the repository.
///
/// # Errors
///
/// Returns `AuthError::Unauthenticated` if none of them exists, and
/// `AuthError::Storage` if a read fails.
#[tracing::instrument(skip_all, fields(claimed = claimed.len()))]
pub async fn validate_organizations(
    repository: &dyn RecordRepository,
    claimed: &[OrgRef],
) -> AuthResult<OrgSet> {
    let reads = claimed
        .iter()
        .map(|org| repository.read(ResourceType::Organization, org.id()));
    let found = try_join_all(reads).await?;

    let orgs: OrgSet = claimed
        .iter()
        .zip(found)
        .filter_map(|(org, stored)| match stored {
            Some(_) => Some(org.clone()),
            None => {
                tracing::debug!(organization = %org, "Claimed organization not found");
                None
            }
        })
        .collect();

    if orgs.is_empty() {
        return Err(AuthError::unauthenticated(
            "No valid access role: Organization not found",
        ));
    }
    Ok(orgs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ampfhir_db_memory::InMemoryStorage;
    use serde_json::json;

    fn org(id: &str) -> OrgRef {
        OrgRef::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_keeps_existing_organizations() {
        let storage = InMemoryStorage::new();
        storage
            .update(&json!({"resourceType": "Organization", "id": "a"}))
            .await
            .unwrap();

        let orgs = validate_organizations(&storage, &[org("a"), org("ghost")])
            .await
            .unwrap();
        assert_eq!(orgs.len(), 1);
        assert!(orgs.contains(&org("a")));
    }

    #[tokio::test]
    async fn test_no_existing_organization() {
        let storage = InMemoryStorage::new();
        let err = validate_organizations(&storage, &[org("ghost")])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unauthenticated: No valid access role: Organization not found"
        );
    }
}

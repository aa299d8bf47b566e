//! Claims extraction from signed bearer tokens.
//!
//! Roles are read from the Keycloak-style `realm_access.roles` claim. A role
//! is a relative reference whose type part selects its meaning:
//!
//! - `Administrator` (or `Administrator/<anything>`) grants admin access
//! - `Organization/<id>` adds an organization the caller acts for
//!
//! Other roles are ignored.
//!
//! # Example
//!
//! ```ignore
//! use ampfhir_auth::token::{BearerClaimsExtractor, ClaimsExtractor};
//!
//! let extractor = BearerClaimsExtractor::from_config(&config)?;
//! let claims = extractor.resolve(Some("Bearer eyJhbGciOi...")).await?;
//! if claims.is_admin { /* unrestricted */ }
//! ```

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use ampfhir_core::OrgRef;

use crate::AuthResult;
use crate::config::AuthzConfig;
use crate::error::AuthError;

const BEARER_PREFIX: &str = "bearer ";

/// Identity facts the authorization core needs about a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    /// Token subject, for logging only.
    pub subject: Option<String>,
    /// Caller holds the admin role.
    pub is_admin: bool,
    /// Organizations claimed by the token, deduplicated, in token order.
    pub organization_ids: Vec<OrgRef>,
}

impl Claims {
    /// Claims of an administrator.
    #[must_use]
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Default::default()
        }
    }

    /// Claims of a caller acting for `organization_ids`.
    #[must_use]
    pub fn for_organizations(organization_ids: impl IntoIterator<Item = OrgRef>) -> Self {
        Self {
            subject: None,
            is_admin: false,
            organization_ids: organization_ids.into_iter().collect(),
        }
    }
}

/// Resolves an `Authorization` header value to [`Claims`].
#[async_trait]
pub trait ClaimsExtractor: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` for a missing, malformed or
    /// unverifiable token, or one granting no role at all.
    async fn resolve(&self, authorization: Option<&str>) -> AuthResult<Claims>;
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    realm_access: Option<RealmAccess>,
}

#[derive(Debug, Default, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

/// [`ClaimsExtractor`] verifying JWTs with a configured key.
pub struct BearerClaimsExtractor {
    decoding_key: DecodingKey,
    validation: Validation,
    admin_role: String,
    organization_role_type: String,
}

impl std::fmt::Debug for BearerClaimsExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerClaimsExtractor")
            .field("algorithms", &self.validation.algorithms)
            .field("admin_role", &self.admin_role)
            .field("organization_role_type", &self.organization_role_type)
            .finish_non_exhaustive()
    }
}

impl BearerClaimsExtractor {
    /// Builds an extractor from the token section of `config`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the algorithm is unsupported or
    /// the key material is missing or unreadable.
    pub fn from_config(config: &AuthzConfig) -> AuthResult<Self> {
        let token = &config.token;
        let algorithm = match token.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            "RS256" => Algorithm::RS256,
            "RS384" => Algorithm::RS384,
            other => {
                return Err(AuthError::configuration(format!(
                    "unsupported token algorithm: {other}"
                )));
            }
        };

        let decoding_key = if token.is_hmac() {
            let secret = token
                .secret
                .as_deref()
                .ok_or_else(|| AuthError::configuration("token.secret is not set"))?;
            DecodingKey::from_secret(secret.as_bytes())
        } else {
            let pem = token
                .public_key_pem
                .as_deref()
                .ok_or_else(|| AuthError::configuration("token.public_key_pem is not set"))?;
            DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| AuthError::configuration(format!("invalid public key: {e}")))?
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = token.leeway.as_secs();
        if let Some(issuer) = &token.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &token.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            decoding_key,
            validation,
            admin_role: config.admin_role.clone(),
            organization_role_type: config.organization_role_type.clone(),
        })
    }

    fn claims_from_roles(&self, subject: Option<String>, roles: &[String]) -> AuthResult<Claims> {
        let mut claims = Claims {
            subject,
            ..Default::default()
        };

        for role in roles {
            let (role_type, id) = match role.split_once('/') {
                Some((role_type, id)) => (role_type, Some(id)),
                None => (role.as_str(), None),
            };

            if role_type == self.admin_role {
                claims.is_admin = true;
            } else if role_type == self.organization_role_type {
                match id.map(OrgRef::new) {
                    Some(Ok(org)) => {
                        if !claims.organization_ids.contains(&org) {
                            claims.organization_ids.push(org);
                        }
                    }
                    _ => tracing::debug!(role = %role, "Ignoring malformed organization role"),
                }
            }
        }

        if !claims.is_admin && claims.organization_ids.is_empty() {
            return Err(AuthError::unauthenticated("No access role defined"));
        }

        Ok(claims)
    }
}

/// Strips a case-insensitive `Bearer ` prefix.
fn bearer_token(authorization: &str) -> Option<&str> {
    let prefix = authorization.get(..BEARER_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        Some(authorization[BEARER_PREFIX.len()..].trim())
    } else {
        None
    }
}

fn token_error(err: &jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    let message = match err.kind() {
        ErrorKind::ExpiredSignature => "Token expired",
        ErrorKind::InvalidSignature => "Invalid token signature",
        ErrorKind::InvalidIssuer => "Invalid token issuer",
        ErrorKind::InvalidAudience => "Invalid token audience",
        ErrorKind::Json(_) => "Invalid authorization header value",
        _ => "Invalid token",
    };
    AuthError::unauthenticated(message)
}

#[async_trait]
impl ClaimsExtractor for BearerClaimsExtractor {
    async fn resolve(&self, authorization: Option<&str>) -> AuthResult<Claims> {
        let header = authorization
            .ok_or_else(|| AuthError::unauthenticated("Missing Authorization header"))?;
        let token = bearer_token(header).ok_or_else(|| {
            AuthError::unauthenticated("Invalid Authorization header. Missing Bearer prefix")
        })?;

        let data = decode::<TokenPayload>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Bearer token rejected");
                token_error(&e)
            })?;

        let payload = data.claims;
        let roles = payload.realm_access.unwrap_or_default().roles;
        self.claims_from_roles(payload.sub, &roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "unit-test-secret";

    fn config() -> AuthzConfig {
        AuthzConfig {
            token: TokenConfig {
                algorithm: "HS256".to_string(),
                secret: Some(SECRET.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn sign(payload: &Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn bearer(roles: &[&str]) -> String {
        let token = sign(&json!({
            "sub": "user-1",
            "exp": now() + 300,
            "realm_access": {"roles": roles}
        }));
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn test_organization_roles() {
        let extractor = BearerClaimsExtractor::from_config(&config()).unwrap();
        let claims = extractor
            .resolve(Some(&bearer(&[
                "offline_access",
                "Organization/1",
                "Organization/2",
                "Organization/1",
            ])))
            .await
            .unwrap();

        assert!(!claims.is_admin);
        assert_eq!(claims.subject.as_deref(), Some("user-1"));
        assert_eq!(
            claims.organization_ids,
            vec![OrgRef::new("1").unwrap(), OrgRef::new("2").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_admin_role() {
        let extractor = BearerClaimsExtractor::from_config(&config()).unwrap();
        let claims = extractor
            .resolve(Some(&bearer(&["Administrator"])))
            .await
            .unwrap();
        assert!(claims.is_admin);
        assert!(claims.organization_ids.is_empty());
    }

    #[tokio::test]
    async fn test_lowercase_bearer_prefix() {
        let extractor = BearerClaimsExtractor::from_config(&config()).unwrap();
        let header = bearer(&["Organization/7"]).replacen("Bearer", "bearer", 1);
        assert!(extractor.resolve(Some(&header)).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_access_role() {
        let extractor = BearerClaimsExtractor::from_config(&config()).unwrap();
        let err = extractor
            .resolve(Some(&bearer(&["offline_access"])))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthenticated: No access role defined");
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header() {
        let extractor = BearerClaimsExtractor::from_config(&config()).unwrap();

        assert!(extractor.resolve(None).await.unwrap_err().is_authentication_error());

        let err = extractor.resolve(Some("Basic dXNlcjpwYXNz")).await.unwrap_err();
        assert!(err.to_string().contains("Missing Bearer prefix"));

        let err = extractor.resolve(Some("Bearer not-a-jwt")).await.unwrap_err();
        assert!(err.is_authentication_error());
    }

    #[tokio::test]
    async fn test_expired_token() {
        let extractor = BearerClaimsExtractor::from_config(&config()).unwrap();
        let token = sign(&json!({
            "exp": now() - 3600,
            "realm_access": {"roles": ["Organization/1"]}
        }));
        let err = extractor
            .resolve(Some(&format!("Bearer {token}")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthenticated: Token expired");
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let mut other = config();
        other.token.secret = Some("another-secret".to_string());
        let extractor = BearerClaimsExtractor::from_config(&other).unwrap();
        let err = extractor
            .resolve(Some(&bearer(&["Organization/1"])))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthenticated: Invalid token signature");
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let mut config = config();
        config.token.algorithm = "ES384".to_string();
        let err = BearerClaimsExtractor::from_config(&config).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }
}

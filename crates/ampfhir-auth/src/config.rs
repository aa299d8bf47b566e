//! Authorization configuration.
//!
//! Covers bearer-token verification, role naming, the decision timeout and
//! which record types are exempt from search narrowing.

use std::time::Duration;

use ampfhir_core::ResourceType;
use serde::{Deserialize, Serialize};

/// Root authorization configuration.
///
/// # Example (TOML)
///
/// ```toml
/// admin_role = "Administrator"
/// decision_timeout = "5s"
///
/// [token]
/// algorithm = "RS256"
/// public_key_pem = "-----BEGIN PUBLIC KEY-----..."
/// issuer = "https://keycloak.example.com/realms/amp"
///
/// [narrowing]
/// unrestricted_types = ["Organization"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Role type granting unconditional access (`Administrator` or
    /// `Administrator/<anything>`).
    pub admin_role: String,

    /// Role type naming an organization membership, as in `Organization/<id>`.
    pub organization_role_type: String,

    /// Bearer token verification.
    pub token: TokenConfig,

    /// Upper bound for one decision or narrowing computation.
    #[serde(with = "humantime_serde")]
    pub decision_timeout: Duration,

    /// Search narrowing options.
    pub narrowing: NarrowingConfig,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            admin_role: "Administrator".to_string(),
            organization_role_type: "Organization".to_string(),
            token: TokenConfig::default(),
            decision_timeout: Duration::from_secs(10),
            narrowing: NarrowingConfig::default(),
        }
    }
}

/// Bearer token verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// JWT algorithm: HS256, HS384, HS512, RS256 or RS384.
    pub algorithm: String,

    /// Shared secret for HS* algorithms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// PEM-encoded public key for RS* algorithms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,

    /// Expected `iss` claim. Not checked when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Expected `aud` claim. Not checked when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Clock skew tolerated when checking `exp`.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            algorithm: "RS256".to_string(),
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: None,
            leeway: Duration::from_secs(60),
        }
    }
}

impl TokenConfig {
    /// Returns `true` for the shared-secret algorithms.
    #[must_use]
    pub fn is_hmac(&self) -> bool {
        matches!(self.algorithm.as_str(), "HS256" | "HS384" | "HS512")
    }
}

/// Search narrowing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NarrowingConfig {
    /// Record types searched without a compartment restriction.
    pub unrestricted_types: Vec<ResourceType>,
}

impl Default for NarrowingConfig {
    fn default() -> Self {
        Self {
            unrestricted_types: vec![ResourceType::Organization],
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl AuthzConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and any error from
    /// [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The admin or organization role is empty
    /// - The token algorithm is not supported
    /// - The decision timeout is zero
    ///
    /// Returns `ConfigError::Missing` if the key material for the token
    /// algorithm is absent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_role.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "admin_role cannot be empty".to_string(),
            ));
        }

        if self.organization_role_type.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "organization_role_type cannot be empty".to_string(),
            ));
        }

        match self.token.algorithm.as_str() {
            "HS256" | "HS384" | "HS512" => {
                if self.token.secret.as_deref().is_none_or(str::is_empty) {
                    return Err(ConfigError::Missing(format!(
                        "token.secret is required for {}",
                        self.token.algorithm
                    )));
                }
            }
            "RS256" | "RS384" => {
                if self.token.public_key_pem.as_deref().is_none_or(str::is_empty) {
                    return Err(ConfigError::Missing(format!(
                        "token.public_key_pem is required for {}",
                        self.token.algorithm
                    )));
                }
            }
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid token algorithm: '{}'. Must be HS256, HS384, HS512, RS256 or RS384",
                    other
                )));
            }
        }

        if self.decision_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "decision_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hs256() -> AuthzConfig {
        AuthzConfig {
            token: TokenConfig {
                algorithm: "HS256".to_string(),
                secret: Some("top-secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AuthzConfig::default();
        assert_eq!(config.admin_role, "Administrator");
        assert_eq!(config.organization_role_type, "Organization");
        assert_eq!(config.decision_timeout, Duration::from_secs(10));
        assert_eq!(
            config.narrowing.unrestricted_types,
            vec![ResourceType::Organization]
        );
    }

    #[test]
    fn test_default_config_requires_key() {
        let err = AuthzConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_hmac_config_validates() {
        assert!(hs256().validate().is_ok());
        assert!(hs256().token.is_hmac());
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let mut config = hs256();
        config.token.algorithm = "none".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidValue(_)
        ));
    }

    #[test]
    fn test_rejects_empty_admin_role() {
        let mut config = hs256();
        config.admin_role = " ".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidValue(_)
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = hs256();
        config.decision_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = AuthzConfig::from_toml_str(
            r#"
            decision_timeout = "250ms"

            [token]
            algorithm = "HS512"
            secret = "s3cr3t"
            leeway = "5s"
            issuer = "https://idp.example.com"

            [narrowing]
            unrestricted_types = ["Organization", "Endpoint"]
            "#,
        )
        .unwrap();

        assert_eq!(config.decision_timeout, Duration::from_millis(250));
        assert_eq!(config.token.leeway, Duration::from_secs(5));
        assert_eq!(config.token.issuer.as_deref(), Some("https://idp.example.com"));
        assert_eq!(config.admin_role, "Administrator");
        assert_eq!(config.narrowing.unrestricted_types.len(), 2);
    }

    #[test]
    fn test_from_toml_parse_error() {
        let err = AuthzConfig::from_toml_str("decision_timeout = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

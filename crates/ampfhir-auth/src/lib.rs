//! # ampfhir-auth
//!
//! Organization compartment authorization for clinical workflow records.
//!
//! A caller authenticates with a bearer token naming the organizations it
//! acts for. It may then act on a record only if that record is reachable
//! from one of those organizations through a chain of typed references,
//! e.g. a report based on a ServiceRequest performed by the organization.
//!
//! ## Modules
//!
//! - [`config`] - Authorization configuration
//! - [`token`] - Claims extraction from bearer tokens
//! - [`policy`] - Reachability rules, instance decisions and search narrowing
//! - [`authorizer`] - Request-level pipeline tying the above together
//! - [`timing`] - Per-request phase timings
//!
//! ## Example
//!
//! ```ignore
//! use ampfhir_auth::prelude::*;
//!
//! let authorizer = CompartmentAuthorizer::from_config(&config, repository)?;
//! let request = AuthRequest::new(Operation::Read, ResourceType::Patient)
//!     .with_target(Target::id("p1"))
//!     .with_authorization(header);
//!
//! let mut timings = RequestTimings::new();
//! match authorizer.authorize(&request, &mut timings).await? {
//!     Authorization::Decision(decision) if decision.is_allowed() => { /* handle */ }
//!     Authorization::Narrowing(list) => { /* restrict search to list */ }
//!     _ => { /* 403 */ }
//! }
//! ```

pub mod authorizer;
pub mod config;
pub mod error;
pub mod policy;
pub mod timing;
pub mod token;

pub use authorizer::{Authorization, CompartmentAuthorizer};
pub use config::{AuthzConfig, ConfigError, NarrowingConfig, TokenConfig};
pub use error::{AuthError, ErrorCategory};
pub use policy::{
    AccessDecision, AuthRequest, AuthorizedList, Compartment, DecisionEngine, DenyReason,
    Operation, OrgSet, ReachabilityResolver, ReachabilityRule, SearchNarrowingFilter, Target,
    validate_organizations,
};
pub use timing::{Phase, RequestTimings};
pub use token::{BearerClaimsExtractor, Claims, ClaimsExtractor};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ampfhir_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authorizer::{Authorization, CompartmentAuthorizer};
    pub use crate::config::{AuthzConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::policy::{
        AccessDecision, AuthRequest, AuthorizedList, Compartment, DecisionEngine, DenyReason,
        Operation, OrgSet, ReachabilityResolver, SearchNarrowingFilter, Target,
    };
    pub use crate::timing::RequestTimings;
    pub use crate::token::{BearerClaimsExtractor, Claims, ClaimsExtractor};
    pub use ampfhir_core::{OrgRef, ResourceType};
}

//! Organization compartment authorization.
//!
//! Access is derived, not attached: a caller acting for a set of
//! organizations may touch a record only if the record is reachable from
//! those organizations through typed references.
//!
//! - [`compartment`] holds the reachability rules per record type
//! - [`reachability`] computes compartments and single-record membership
//! - [`engine`] decides single-record operations
//! - [`narrowing`] restricts searches to a compartment
//! - [`organizations`] validates the organizations a token claims
//!
//! The decision engine and the narrowing filter share the resolver, so a
//! record is readable exactly when a search may return it:
//!
//! ```ignore
//! use ampfhir_auth::policy::{DecisionEngine, ReachabilityResolver, SearchNarrowingFilter};
//!
//! let resolver = ReachabilityResolver::new(repository);
//! let engine = DecisionEngine::new(resolver.clone());
//! let filter = SearchNarrowingFilter::new(resolver, &config.narrowing);
//!
//! let list = filter.narrow(ResourceType::Patient, &orgs, false).await?;
//! ```

pub mod compartment;
pub mod context;
pub mod engine;
pub mod narrowing;
pub mod organizations;
pub mod reachability;

pub use compartment::{ReachabilityRule, evaluation_order, rules};
pub use context::{AuthRequest, Operation, OrgSet, Target};
pub use engine::{AccessDecision, DecisionEngine, DenyReason};
pub use narrowing::{AuthorizedList, SearchNarrowingFilter};
pub use organizations::validate_organizations;
pub use reachability::{Compartment, ReachabilityResolver};

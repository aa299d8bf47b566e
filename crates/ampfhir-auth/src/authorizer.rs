//! Request-level authorization.
//!
//! [`CompartmentAuthorizer`] runs the whole pipeline for one request:
//!
//! 1. Metadata is allowed without credentials.
//! 2. The bearer token is resolved to claims.
//! 3. Administrators are allowed everything, searches included.
//! 4. Claimed organizations are checked against the repository.
//! 5. Paging is allowed; searches are narrowed; everything else is decided.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ampfhir_storage::DynRepository;

use crate::AuthResult;
use crate::config::AuthzConfig;
use crate::error::AuthError;
use crate::policy::{
    AccessDecision, AuthRequest, AuthorizedList, DecisionEngine, DenyReason, Operation,
    ReachabilityResolver, SearchNarrowingFilter, validate_organizations,
};
use crate::timing::{Phase, RequestTimings};
use crate::token::{BearerClaimsExtractor, ClaimsExtractor};

/// Outcome of authorizing one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    /// Verdict for a single-record or system operation.
    Decision(AccessDecision),
    /// Restriction for a search.
    Narrowing(AuthorizedList),
}

impl Authorization {
    /// Returns `true` unless the request was denied outright.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        match self {
            Self::Decision(decision) => decision.is_allowed(),
            Self::Narrowing(list) => !list.is_denied(),
        }
    }

    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Decision(decision) => decision.deny_reason(),
            Self::Narrowing(list) => list.deny_reason(),
        }
    }
}

/// Authorizes requests against organization compartments.
pub struct CompartmentAuthorizer {
    claims: Arc<dyn ClaimsExtractor>,
    repository: DynRepository,
    engine: DecisionEngine,
    filter: SearchNarrowingFilter,
    decision_timeout: Duration,
}

impl std::fmt::Debug for CompartmentAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompartmentAuthorizer")
            .field("backend", &self.repository.backend_name())
            .field("decision_timeout", &self.decision_timeout)
            .finish_non_exhaustive()
    }
}

impl CompartmentAuthorizer {
    /// Creates an authorizer with a custom claims extractor.
    #[must_use]
    pub fn new(
        config: &AuthzConfig,
        repository: DynRepository,
        claims: Arc<dyn ClaimsExtractor>,
    ) -> Self {
        let resolver = ReachabilityResolver::new(repository.clone());
        Self {
            claims,
            repository,
            engine: DecisionEngine::new(resolver.clone()),
            filter: SearchNarrowingFilter::new(resolver, &config.narrowing),
            decision_timeout: config.decision_timeout,
        }
    }

    /// Creates an authorizer verifying bearer tokens as configured.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the configuration is invalid.
    pub fn from_config(config: &AuthzConfig, repository: DynRepository) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;
        let claims = BearerClaimsExtractor::from_config(config)?;
        Ok(Self::new(config, repository, Arc::new(claims)))
    }

    #[must_use]
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    #[must_use]
    pub fn filter(&self) -> &SearchNarrowingFilter {
        &self.filter
    }

    /// Authorizes `request`, recording phase timings into `timings`.
    ///
    /// # Errors
    ///
    /// - `AuthError::Unauthenticated` for bad credentials or when no claimed
    ///   organization exists
    /// - `AuthError::Storage` when the repository fails
    /// - `AuthError::Timeout` when the decision exceeds its time limit
    #[tracing::instrument(
        skip_all,
        fields(operation = %request.operation, resource_type = ?request.resource_type)
    )]
    pub async fn authorize(
        &self,
        request: &AuthRequest,
        timings: &mut RequestTimings,
    ) -> AuthResult<Authorization> {
        let result = self.run(request, timings).await;
        match &result {
            Ok(authorization) => tracing::debug!(
                allowed = authorization.is_allowed(),
                timings = %timings,
                "Authorization complete"
            ),
            Err(e) if e.is_server_error() => {
                tracing::error!(error = %e, category = %e.category(), "Authorization failed");
            }
            Err(e) => tracing::debug!(error = %e, category = %e.category(), "Request rejected"),
        }
        result
    }

    async fn run(
        &self,
        request: &AuthRequest,
        timings: &mut RequestTimings,
    ) -> AuthResult<Authorization> {
        if request.operation == Operation::Metadata {
            return Ok(Authorization::Decision(AccessDecision::Allow));
        }

        timings.begin(Phase::Claims);
        let claims = self
            .claims
            .resolve(request.authorization.as_deref())
            .await;
        timings.end(Phase::Claims);
        let claims = claims?;

        if claims.is_admin {
            tracing::debug!(subject = ?claims.subject, "Administrator access");
            return Ok(match request.operation {
                Operation::Search => Authorization::Narrowing(AuthorizedList::Unrestricted),
                _ => Authorization::Decision(AccessDecision::Allow),
            });
        }

        timings.begin(Phase::Organizations);
        let orgs = self
            .bounded(validate_organizations(
                self.repository.as_ref(),
                &claims.organization_ids,
            ))
            .await;
        timings.end(Phase::Organizations);
        let orgs = orgs?;

        if request.operation == Operation::GetPage {
            return Ok(Authorization::Decision(AccessDecision::Allow));
        }

        let Some(resource_type) = request.resource_type else {
            return Ok(Authorization::Decision(AccessDecision::Deny(
                DenyReason::invalid_request("missing resource type"),
            )));
        };

        if request.operation == Operation::Search {
            timings.begin(Phase::Narrowing);
            let list = self
                .bounded(self.filter.narrow(resource_type, &orgs, false))
                .await;
            timings.end(Phase::Narrowing);
            return Ok(Authorization::Narrowing(list?));
        }

        timings.begin(Phase::Decision);
        let decision = self
            .bounded(self.engine.decide(
                request.operation,
                resource_type,
                &request.target,
                &orgs,
                false,
            ))
            .await;
        timings.end(Phase::Decision);
        Ok(Authorization::Decision(decision?))
    }

    /// Runs `future` under the decision timeout. Dropping it on timeout
    /// cancels any repository call still in flight.
    async fn bounded<T, E>(&self, future: impl Future<Output = Result<T, E>>) -> AuthResult<T>
    where
        AuthError: From<E>,
    {
        match tokio::time::timeout(self.decision_timeout, future).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => Err(AuthError::Timeout {
                elapsed_ms: self.decision_timeout.as_millis(),
            }),
        }
    }
}

//! SSO Session Bridge: turns an inbound bearer token into an authenticated
//! local session, or silently steps aside.
//!
//! The bridge drives one inbound request through token validation, user
//! resolution, tenant reconciliation and session establishment. Every exit
//! path yields a [`BridgeOutcome`] and the caller always continues its
//! request chain: a failure here defers to whatever authentication follows
//! downstream. Only logs and metrics distinguish the failure branches.

use crate::claims::ClaimSet;
use crate::config::TenantSecurityConfig;
use crate::errors::SsoError;
use crate::observability::metrics::record_bridge_outcome;
use crate::validator::TokenValidator;
use std::future::Future;

/// Case-sensitive scheme prefix of the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// A user record resolved from the external store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub login_id: String,
    pub tenant_id: String,
    pub enabled: bool,
    pub has_logged_out: bool,
}

/// Per-request authenticated identity plus the active tenant.
///
/// Mutated by the bridge: tenant crossover switches `active_tenant`, and a
/// successful run sets `login_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub active_tenant: String,
    pub login_id: Option<String>,
}

impl SessionContext {
    #[must_use]
    pub fn new(active_tenant: impl Into<String>) -> Self {
        Self {
            active_tenant: active_tenant.into(),
            login_id: None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.login_id.is_some()
    }
}

/// External user-record store.
///
/// `logout_check` lets an externally flagged logged-out user be rejected
/// after lookup; it returns the (possibly updated) record when the user may
/// proceed.
pub trait UserStore: Send + Sync {
    fn find_user(
        &self,
        login_id: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, SsoError>> + Send;

    fn persist(
        &self,
        record: &UserRecord,
    ) -> impl Future<Output = Result<(), SsoError>> + Send;

    fn logout_check(
        &self,
        record: &UserRecord,
    ) -> impl Future<Output = Result<Option<UserRecord>, SsoError>> + Send;
}

/// External per-tenant configuration lookup.
pub trait TenantDirectory: Send + Sync {
    fn security_config(
        &self,
        tenant_id: &str,
    ) -> impl Future<Output = Result<Option<TenantSecurityConfig>, SsoError>> + Send;
}

/// Why the bridge stepped aside for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// SSO is disabled for the tenant.
    Disabled,
    /// No usable `Authorization: Bearer` header.
    NoBearerToken,
    /// Token failed validation.
    InvalidToken,
    /// Token validated but carries no identity claim.
    MissingIdentityClaim,
    /// No enabled-for-lookup user record for the identity claim.
    UnknownUser,
    /// The logout check rejected the user.
    LoggedOut,
    /// Clearing the logged-out flag could not be persisted.
    PersistFailed,
    /// Tenant configuration could not be loaded.
    TenantConfigUnavailable,
}

impl SkipReason {
    /// Bounded label for metrics and logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::NoBearerToken => "no_bearer_token",
            SkipReason::InvalidToken => "invalid_token",
            SkipReason::MissingIdentityClaim => "missing_identity_claim",
            SkipReason::UnknownUser => "unknown_user",
            SkipReason::LoggedOut => "logged_out",
            SkipReason::PersistFailed => "persist_failed",
            SkipReason::TenantConfigUnavailable => "tenant_config_unavailable",
        }
    }
}

/// Terminal outcome of one bridge run.
///
/// Callers continue the request chain either way; `Skipped` is not an error
/// to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    Authenticated { login_id: String, tenant_id: String },
    Skipped(SkipReason),
}

/// Extract the bearer token from an `Authorization` header value.
///
/// The `Bearer ` prefix is case-sensitive; the remainder is trimmed and an
/// empty remainder counts as absent.
#[must_use]
pub fn extract_bearer_token(authorization: Option<&str>) -> Option<&str> {
    let value = authorization?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// The bridge itself: validator plus the external collaborators.
#[derive(Debug)]
pub struct SsoBridge<S, D> {
    validator: TokenValidator,
    user_store: S,
    tenants: D,
}

impl<S: UserStore, D: TenantDirectory> SsoBridge<S, D> {
    pub fn new(validator: TokenValidator, user_store: S, tenants: D) -> Self {
        Self {
            validator,
            user_store,
            tenants,
        }
    }

    /// The user store collaborator. Exposed so tests can inspect fakes.
    pub fn user_store(&self) -> &S {
        &self.user_store
    }

    /// Run the bridge for one inbound request.
    ///
    /// `session` carries the request's active tenant in and, on success, the
    /// authenticated identity out. This function never fails: every internal
    /// error becomes a `Skipped` outcome.
    pub async fn process_request(
        &self,
        authorization: Option<&str>,
        session: &mut SessionContext,
    ) -> BridgeOutcome {
        let outcome = self.run(authorization, session).await;
        match &outcome {
            BridgeOutcome::Authenticated { tenant_id, .. } => {
                record_bridge_outcome("authenticated");
                tracing::info!(
                    target: "sso.bridge",
                    tenant_id = tenant_id.as_str(),
                    "SSO session established"
                );
            }
            BridgeOutcome::Skipped(reason) => {
                record_bridge_outcome(reason.label());
            }
        }
        outcome
    }

    async fn run(
        &self,
        authorization: Option<&str>,
        session: &mut SessionContext,
    ) -> BridgeOutcome {
        let tenant_id = session.active_tenant.clone();

        let config = match self.tenants.security_config(&tenant_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::warn!(
                    target: "sso.bridge",
                    tenant_id = tenant_id.as_str(),
                    "No security configuration for tenant"
                );
                return BridgeOutcome::Skipped(SkipReason::TenantConfigUnavailable);
            }
            Err(e) => {
                tracing::warn!(
                    target: "sso.bridge",
                    tenant_id = tenant_id.as_str(),
                    error = %e,
                    "Tenant configuration lookup failed"
                );
                return BridgeOutcome::Skipped(SkipReason::TenantConfigUnavailable);
            }
        };

        if !config.sso_enabled {
            return BridgeOutcome::Skipped(SkipReason::Disabled);
        }

        let Some(token) = extract_bearer_token(authorization) else {
            return BridgeOutcome::Skipped(SkipReason::NoBearerToken);
        };

        let claims = match self.validator.validate(&tenant_id, &config, token, None).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(
                    target: "sso.bridge",
                    tenant_id = tenant_id.as_str(),
                    error = %e,
                    "Bearer token validation failed, passing through"
                );
                return BridgeOutcome::Skipped(SkipReason::InvalidToken);
            }
        };

        match self.resolve_user(&tenant_id, &claims).await {
            Ok(record) => self.establish_session(session, record).await,
            Err(reason) => BridgeOutcome::Skipped(reason),
        }
    }

    /// Steps 4 and 5: user lookup, then the logout check on the provisional
    /// identity.
    async fn resolve_user(
        &self,
        tenant_id: &str,
        claims: &ClaimSet,
    ) -> Result<UserRecord, SkipReason> {
        let Some(login_id) = claims.user_login_id() else {
            tracing::warn!(
                target: "sso.bridge",
                tenant_id = tenant_id,
                "Validated token carries no identity claim"
            );
            return Err(SkipReason::MissingIdentityClaim);
        };

        let record = match self.user_store.find_user(login_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(
                    target: "sso.bridge",
                    tenant_id = tenant_id,
                    "No user record for identity claim"
                );
                return Err(SkipReason::UnknownUser);
            }
            Err(e) => {
                tracing::warn!(
                    target: "sso.bridge",
                    tenant_id = tenant_id,
                    error = %e,
                    "User lookup failed"
                );
                return Err(SkipReason::UnknownUser);
            }
        };

        match self.user_store.logout_check(&record).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                tracing::debug!(
                    target: "sso.bridge",
                    tenant_id = tenant_id,
                    "Logout check rejected user"
                );
                Err(SkipReason::LoggedOut)
            }
            Err(e) => {
                tracing::warn!(
                    target: "sso.bridge",
                    tenant_id = tenant_id,
                    error = %e,
                    "Logout check failed"
                );
                Err(SkipReason::LoggedOut)
            }
        }
    }

    /// Steps 6 through 8: tenant reconciliation, logged-out flag clearing,
    /// session establishment.
    async fn establish_session(
        &self,
        session: &mut SessionContext,
        mut record: UserRecord,
    ) -> BridgeOutcome {
        if record.tenant_id != session.active_tenant {
            tracing::info!(
                target: "sso.bridge",
                from_tenant = session.active_tenant.as_str(),
                to_tenant = record.tenant_id.as_str(),
                "Identity crosses tenant boundary, switching active tenant"
            );
            session.active_tenant = record.tenant_id.clone();
        }

        // A disabled record is not persisted but still proceeds.
        if record.enabled {
            record.has_logged_out = false;
            if let Err(e) = self.user_store.persist(&record).await {
                tracing::warn!(
                    target: "sso.bridge",
                    tenant_id = record.tenant_id.as_str(),
                    error = %e,
                    "Failed to persist cleared logged-out flag"
                );
                return BridgeOutcome::Skipped(SkipReason::PersistFailed);
            }
        }

        session.login_id = Some(record.login_id.clone());
        BridgeOutcome::Authenticated {
            login_id: record.login_id,
            tenant_id: record.tenant_id,
        }
    }
}

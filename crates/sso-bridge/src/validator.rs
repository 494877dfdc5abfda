//! Validation Orchestrator: verifies inbound tokens under the tenant's
//! trust mode and enforces token-class discrimination.
//!
//! Local-trust tenants verify with the shared HMAC secret; remote-trust
//! tenants resolve the token's `kid` to a published key first. Access and
//! refresh tokens are never interchangeable: [`TokenValidator::validate`]
//! rejects refresh tokens and [`TokenValidator::validate_refresh`] rejects
//! everything else.

use crate::claims::ClaimSet;
use crate::codec;
use crate::config::{TenantSecurityConfig, TrustMode};
use crate::errors::SsoError;
use crate::jwks::KeyResolver;
use crate::observability::metrics::record_token_validation;
use std::sync::Arc;

/// Stateless orchestration over the codec and the key resolver.
///
/// Cheap to clone; the resolver (and its caches) is shared.
#[derive(Clone, Debug)]
pub struct TokenValidator {
    resolver: Arc<KeyResolver>,
}

impl TokenValidator {
    /// Build a validator with its own key resolver.
    ///
    /// # Errors
    ///
    /// Fails when the resolver's HTTP client cannot be constructed.
    pub fn new() -> Result<Self, SsoError> {
        Ok(Self {
            resolver: Arc::new(KeyResolver::new()?),
        })
    }

    /// Build a validator around an existing resolver, sharing its caches.
    #[must_use]
    pub fn with_resolver(resolver: Arc<KeyResolver>) -> Self {
        Self { resolver }
    }

    /// Validate an access token for a tenant and return its claims.
    ///
    /// # Errors
    ///
    /// Any verification or key-resolution failure, plus
    /// `SsoError::RefreshTokenNotAllowed` when the token is a refresh token.
    pub async fn validate(
        &self,
        tenant_id: &str,
        config: &TenantSecurityConfig,
        token: &str,
        salt: Option<&str>,
    ) -> Result<ClaimSet, SsoError> {
        let claims = self.verify(tenant_id, config, token, salt).await?;
        if claims.is_refresh() {
            record_token_validation(trust_label(&config.trust), "token_class");
            return Err(SsoError::RefreshTokenNotAllowed);
        }
        record_token_validation(trust_label(&config.trust), "success");
        Ok(claims)
    }

    /// Validate a refresh token for a tenant and return its claims.
    ///
    /// # Errors
    ///
    /// Any verification or key-resolution failure, plus
    /// `SsoError::NotRefreshToken` when the token lacks the refresh marker.
    pub async fn validate_refresh(
        &self,
        tenant_id: &str,
        config: &TenantSecurityConfig,
        token: &str,
        salt: Option<&str>,
    ) -> Result<ClaimSet, SsoError> {
        let claims = self.verify(tenant_id, config, token, salt).await?;
        if !claims.is_refresh() {
            record_token_validation(trust_label(&config.trust), "token_class");
            return Err(SsoError::NotRefreshToken);
        }
        record_token_validation(trust_label(&config.trust), "success");
        Ok(claims)
    }

    async fn verify(
        &self,
        tenant_id: &str,
        config: &TenantSecurityConfig,
        token: &str,
        salt: Option<&str>,
    ) -> Result<ClaimSet, SsoError> {
        let result = match &config.trust {
            TrustMode::LocalHmac => codec::verify_local(config, token, salt),
            TrustMode::RemoteJwk { issuer, audience } => {
                let kid = codec::extract_kid(token)?;
                let key = self.resolver.resolve(tenant_id, issuer, &kid).await?;
                codec::verify_remote(token, &key, issuer, audience)
            }
        };
        if let Err(e) = &result {
            record_token_validation(trust_label(&config.trust), e.category());
        }
        result
    }
}

fn trust_label(trust: &TrustMode) -> &'static str {
    match trust {
        TrustMode::LocalHmac => "local",
        TrustMode::RemoteJwk { .. } => "remote",
    }
}

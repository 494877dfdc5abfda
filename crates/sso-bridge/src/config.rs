//! Per-tenant security configuration.
//!
//! Tenant configuration reaches this subsystem as a string-keyed property
//! bag; it is parsed once per tenant into a typed [`TenantSecurityConfig`]
//! and passed explicitly into every operation. The trust mode is a closed
//! variant selected at parse time, so validation code never re-inspects raw
//! properties.

use crate::errors::SsoError;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;

pub const PROP_SSO_ENABLED: &str = "security.internal.sso.enabled";
pub const PROP_TOKEN_ISSUER: &str = "security.token.issuer";
pub const PROP_TOKEN_AUDIENCE: &str = "security.token.audience";
pub const PROP_TOKEN_SECRET: &str = "security.token.key";
pub const PROP_ACCESS_TOKEN_TTL: &str = "security.jwt.token.expireTime";
pub const PROP_REFRESH_TOKEN_TTL: &str = "security.jwt.refresh.token.expireTime";

/// Default access token lifetime (30 minutes).
pub const DEFAULT_ACCESS_TOKEN_TTL: i64 = 1800;

/// Default refresh token lifetime (24 hours).
pub const DEFAULT_REFRESH_TOKEN_TTL: i64 = 86400;

/// How token signatures are trusted for this tenant.
///
/// Selected once per tenant: a configured issuer URL means tokens are
/// verified against that issuer's published key set; otherwise tokens are
/// verified locally with the shared HMAC secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustMode {
    /// Keyed-hash verification with the tenant's shared secret.
    LocalHmac,
    /// Asymmetric verification against keys published by a remote issuer.
    RemoteJwk { issuer: String, audience: String },
}

/// Typed security configuration for one tenant.
///
/// Read-only during a validation or issuance call. The signing secret lives
/// outside [`TrustMode`] because issuance is always HMAC-based, even for
/// tenants that verify inbound tokens remotely.
#[derive(Clone)]
pub struct TenantSecurityConfig {
    pub sso_enabled: bool,
    pub trust: TrustMode,
    signing_secret: SecretString,
    pub access_token_ttl: i64,
    pub refresh_token_ttl: i64,
}

impl fmt::Debug for TenantSecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantSecurityConfig")
            .field("sso_enabled", &self.sso_enabled)
            .field("trust", &self.trust)
            .field("signing_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

impl TenantSecurityConfig {
    /// Parse a tenant's property bag into a typed configuration.
    ///
    /// A present, non-empty issuer property selects remote trust; otherwise
    /// verification falls back to the locally shared secret. Unparseable TTL
    /// properties are configuration errors, not silent defaults.
    ///
    /// # Errors
    ///
    /// Returns `SsoError::Configuration` when a TTL property is present but
    /// not a valid integer.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, SsoError> {
        let sso_enabled = props
            .get(PROP_SSO_ENABLED)
            .map(|v| v == "true")
            .unwrap_or(false);

        let issuer = props
            .get(PROP_TOKEN_ISSUER)
            .map(String::as_str)
            .unwrap_or("");

        let trust = if issuer.is_empty() {
            TrustMode::LocalHmac
        } else {
            TrustMode::RemoteJwk {
                issuer: issuer.to_string(),
                audience: props.get(PROP_TOKEN_AUDIENCE).cloned().unwrap_or_default(),
            }
        };

        let signing_secret =
            SecretString::from(props.get(PROP_TOKEN_SECRET).cloned().unwrap_or_default());

        Ok(Self {
            sso_enabled,
            trust,
            signing_secret,
            access_token_ttl: parse_ttl(props, PROP_ACCESS_TOKEN_TTL, DEFAULT_ACCESS_TOKEN_TTL)?,
            refresh_token_ttl: parse_ttl(props, PROP_REFRESH_TOKEN_TTL, DEFAULT_REFRESH_TOKEN_TTL)?,
        })
    }

    /// Local-trust configuration with default TTLs, SSO enabled.
    #[must_use]
    pub fn local(secret: impl Into<String>) -> Self {
        Self {
            sso_enabled: true,
            trust: TrustMode::LocalHmac,
            signing_secret: SecretString::from(secret.into()),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
        }
    }

    /// Remote-trust configuration with default TTLs, SSO enabled.
    #[must_use]
    pub fn remote(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            sso_enabled: true,
            trust: TrustMode::RemoteJwk {
                issuer: issuer.into(),
                audience: audience.into(),
            },
            signing_secret: SecretString::from(secret.into()),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
        }
    }

    #[must_use]
    pub fn with_sso_enabled(mut self, enabled: bool) -> Self {
        self.sso_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl_seconds: i64) -> Self {
        self.access_token_ttl = ttl_seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl_seconds: i64) -> Self {
        self.refresh_token_ttl = ttl_seconds;
        self
    }

    /// The raw shared secret. Kept crate-internal; only the codec derives
    /// signing keys from it.
    pub(crate) fn signing_secret(&self) -> &str {
        self.signing_secret.expose_secret()
    }
}

fn parse_ttl(
    props: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> Result<i64, SsoError> {
    match props.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            SsoError::Configuration(format!("Property {key} is not a valid integer: {raw}"))
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn props(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_from_properties_local_mode() {
        let config = TenantSecurityConfig::from_properties(&props(&[
            (PROP_SSO_ENABLED, "true"),
            (PROP_TOKEN_SECRET, "secret"),
        ]))
        .unwrap();

        assert!(config.sso_enabled);
        assert_eq!(config.trust, TrustMode::LocalHmac);
        assert_eq!(config.access_token_ttl, DEFAULT_ACCESS_TOKEN_TTL);
        assert_eq!(config.refresh_token_ttl, DEFAULT_REFRESH_TOKEN_TTL);
    }

    #[test]
    fn test_from_properties_remote_mode() {
        let config = TenantSecurityConfig::from_properties(&props(&[
            (PROP_SSO_ENABLED, "true"),
            (PROP_TOKEN_ISSUER, "https://idp.example.com/realms/acme"),
            (PROP_TOKEN_AUDIENCE, "webapp"),
        ]))
        .unwrap();

        assert_eq!(
            config.trust,
            TrustMode::RemoteJwk {
                issuer: "https://idp.example.com/realms/acme".to_string(),
                audience: "webapp".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_issuer_falls_back_to_local() {
        let config =
            TenantSecurityConfig::from_properties(&props(&[(PROP_TOKEN_ISSUER, "")])).unwrap();
        assert_eq!(config.trust, TrustMode::LocalHmac);
    }

    #[test]
    fn test_sso_disabled_by_default() {
        let config = TenantSecurityConfig::from_properties(&props(&[])).unwrap();
        assert!(!config.sso_enabled);
    }

    #[test]
    fn test_custom_ttls() {
        let config = TenantSecurityConfig::from_properties(&props(&[
            (PROP_ACCESS_TOKEN_TTL, "600"),
            (PROP_REFRESH_TOKEN_TTL, "3600"),
        ]))
        .unwrap();

        assert_eq!(config.access_token_ttl, 600);
        assert_eq!(config.refresh_token_ttl, 3600);
    }

    #[test]
    fn test_invalid_ttl_is_a_configuration_error() {
        let result =
            TenantSecurityConfig::from_properties(&props(&[(PROP_ACCESS_TOKEN_TTL, "soon")]));
        assert!(
            matches!(result, Err(SsoError::Configuration(msg)) if msg.contains(PROP_ACCESS_TOKEN_TTL))
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = TenantSecurityConfig::local("super-secret-signing-key");
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("super-secret-signing-key"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}

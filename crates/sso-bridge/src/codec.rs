//! Token codec: issuing and verifying signed, expiring identity tokens.
//!
//! Issuance is always a keyed hash (HS512) over the tenant's shared secret,
//! optionally prefixed with a hex-encoded salt. Verification runs in one of
//! two mutually exclusive modes selected by the tenant's [`TrustMode`]:
//! local HS512 with the same key derivation, or RS256 against a public key
//! resolved from the issuer's published key set.
//!
//! All functions here are pure computations; the network-facing half of
//! remote verification lives in [`crate::jwks`].

use crate::claims::ClaimSet;
use crate::config::TenantSecurityConfig;
use crate::errors::SsoError;
use crate::observability::metrics::record_token_issuance;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Issuer embedded in every locally minted token and required when
/// verifying in local mode.
pub const TOKEN_ISSUER: &str = "sso-bridge";

/// Minimum shared-secret length in characters. HS512 is a 512-bit keyed
/// hash; anything shorter weakens the signature.
pub const MIN_SECRET_LENGTH: usize = 64;

/// Maximum accepted token size in bytes. Oversized tokens are rejected
/// before any base64 or signature work.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Wire payload: registered claims plus the flat string claim set.
#[derive(Serialize, Deserialize)]
struct TokenPayload {
    iss: String,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    claims: BTreeMap<String, serde_json::Value>,
}

/// Derive the HMAC signing key for a tenant.
///
/// With a salt present, the key is the lower-case hex encoding of the salt's
/// bytes concatenated in front of the shared secret; otherwise the secret
/// unmodified. Fails when the secret is shorter than [`MIN_SECRET_LENGTH`].
fn derive_signing_key(
    config: &TenantSecurityConfig,
    salt: Option<&str>,
) -> Result<String, SsoError> {
    let secret = config.signing_secret();
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(SsoError::Configuration(format!(
            "Shared token secret is too short: {} chars, need at least {} (512 bits)",
            secret.len(),
            MIN_SECRET_LENGTH
        )));
    }
    match salt {
        Some(salt) if !salt.is_empty() => Ok(format!("{}{}", hex::encode(salt.as_bytes()), secret)),
        _ => Ok(secret.to_string()),
    }
}

/// Issue a signed access token embedding `claims`.
///
/// `ttl_seconds <= 0` selects the tenant's configured access-token TTL.
///
/// # Errors
///
/// Returns `SsoError::Configuration` when the shared secret is too short and
/// `SsoError::Crypto` when signing itself fails.
pub fn issue(
    config: &TenantSecurityConfig,
    claims: &ClaimSet,
    ttl_seconds: i64,
    salt: Option<&str>,
) -> Result<String, SsoError> {
    issue_at(config, claims, ttl_seconds, salt, Utc::now().timestamp())
}

/// Deterministic issuance against an explicit `now` timestamp.
///
/// Prefer [`issue`] in production code; this variant exists so expiry
/// boundaries can be unit-tested without sleeping.
pub(crate) fn issue_at(
    config: &TenantSecurityConfig,
    claims: &ClaimSet,
    ttl_seconds: i64,
    salt: Option<&str>,
    now: i64,
) -> Result<String, SsoError> {
    let token_class = if claims.is_refresh() { "refresh" } else { "access" };
    let ttl = if ttl_seconds > 0 {
        ttl_seconds
    } else {
        config.access_token_ttl
    };

    let key = match derive_signing_key(config, salt) {
        Ok(key) => key,
        Err(e) => {
            record_token_issuance(token_class, "error");
            return Err(e);
        }
    };

    let payload = TokenPayload {
        iss: TOKEN_ISSUER.to_string(),
        iat: now,
        exp: now + ttl,
        claims: claims
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect(),
    };

    let token = encode(
        &Header::new(Algorithm::HS512),
        &payload,
        &EncodingKey::from_secret(key.as_bytes()),
    )
    .map_err(|e| {
        record_token_issuance(token_class, "error");
        SsoError::Crypto(format!("Token signing failed: {e}"))
    })?;

    record_token_issuance(token_class, "success");
    Ok(token)
}

/// Issue an access token carrying only the identity claim.
pub fn issue_access_token(
    config: &TenantSecurityConfig,
    user_login_id: &str,
) -> Result<String, SsoError> {
    issue(config, &ClaimSet::for_user(user_login_id), 0, None)
}

/// Verify a locally signed token and extract its claims.
///
/// The signing key is derived exactly as in [`issue`] (same salt rule); the
/// issuer is fixed and expiry is validated with zero leeway.
pub fn verify_local(
    config: &TenantSecurityConfig,
    token: &str,
    salt: Option<&str>,
) -> Result<ClaimSet, SsoError> {
    check_token_size(token)?;
    let key = derive_signing_key(config, salt)?;

    let mut validation = Validation::new(Algorithm::HS512);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.validate_aud = false;
    validation.leeway = 0;

    let data = decode::<TokenPayload>(
        token,
        &DecodingKey::from_secret(key.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(target: "sso.codec", error = %e, "Local token verification failed");
        SsoError::Verification(e.to_string())
    })?;

    Ok(string_claims(data.claims.claims))
}

/// Verify a remotely issued token against a resolved public key.
///
/// Signature, expiry, issuer and audience are all checked; the caller
/// supplies the key resolved for the token's `kid` header.
pub fn verify_remote(
    token: &str,
    key: &DecodingKey,
    issuer: &str,
    audience: &str,
) -> Result<ClaimSet, SsoError> {
    check_token_size(token)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.leeway = 0;

    let data = decode::<TokenPayload>(token, key, &validation).map_err(|e| {
        tracing::debug!(target: "sso.codec", error = %e, "Remote token verification failed");
        SsoError::Verification(e.to_string())
    })?;

    Ok(string_claims(data.claims.claims))
}

/// Extract the `kid` (key ID) from a token header without verifying the
/// signature.
///
/// Used in remote mode to look up the verification key. The token MUST
/// still be verified after the key is fetched.
///
/// # Errors
///
/// Returns `SsoError::Verification` for oversized, malformed or kid-less
/// tokens.
pub fn extract_kid(token: &str) -> Result<String, SsoError> {
    check_token_size(token)?;

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(SsoError::Verification(
            "Token is not in compact JWT form".to_string(),
        ));
    }

    let header_part = parts
        .first()
        .ok_or_else(|| SsoError::Verification("Token is not in compact JWT form".to_string()))?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "sso.codec", error = %e, "Failed to decode token header base64");
        SsoError::Verification("Token header is not valid base64".to_string())
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "sso.codec", error = %e, "Failed to parse token header JSON");
        SsoError::Verification("Token header is not valid JSON".to_string())
    })?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| SsoError::Verification("Token header has no key id".to_string()))
}

fn check_token_size(token: &str) -> Result<(), SsoError> {
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "sso.codec",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(SsoError::Verification(
            "Token exceeds maximum allowed size".to_string(),
        ));
    }
    Ok(())
}

/// Keep only string-valued claims, dropping the registered claims already
/// consumed by validation.
fn string_claims(raw: BTreeMap<String, serde_json::Value>) -> ClaimSet {
    raw.into_iter()
        .filter_map(|(name, value)| match value {
            serde_json::Value::String(s) => Some((name, s)),
            _ => None,
        })
        .collect()
}

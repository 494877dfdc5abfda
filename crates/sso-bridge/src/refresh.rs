//! Refresh Flow: minting long-lived refresh tokens.
//!
//! A refresh token is an ordinary signed token whose claim set carries the
//! identity claim plus the `type=refresh` marker, issued with the tenant's
//! refresh TTL. The validation half lives in
//! [`crate::validator::TokenValidator::validate_refresh`].

use crate::claims::{ClaimSet, CLAIM_TOKEN_TYPE, TOKEN_TYPE_REFRESH};
use crate::codec;
use crate::config::TenantSecurityConfig;
use crate::errors::SsoError;

/// Issue a refresh token for `user_login_id` under the tenant's refresh TTL.
///
/// # Errors
///
/// Same failure modes as [`codec::issue`].
pub fn issue_refresh_token(
    config: &TenantSecurityConfig,
    user_login_id: &str,
) -> Result<String, SsoError> {
    let mut claims = ClaimSet::for_user(user_login_id);
    claims.insert(CLAIM_TOKEN_TYPE, TOKEN_TYPE_REFRESH);
    codec::issue(config, &claims, config.refresh_token_ttl, None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    const TEST_SECRET: &str =
        "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_refresh_token_carries_marker_and_identity() {
        let config = TenantSecurityConfig::local(TEST_SECRET);
        let token = issue_refresh_token(&config, "alice").unwrap();

        let claims = codec::verify_local(&config, &token, None).unwrap();
        assert!(claims.is_refresh());
        assert_eq!(claims.user_login_id(), Some("alice"));
    }

    #[test]
    fn test_refresh_token_uses_refresh_ttl() {
        let config = TenantSecurityConfig::local(TEST_SECRET).with_refresh_token_ttl(7200);
        let token = issue_refresh_token(&config, "alice").unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let payload_bytes = URL_SAFE_NO_PAD.decode(parts.get(1).unwrap()).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).unwrap();

        let iat = payload.get("iat").and_then(serde_json::Value::as_i64).unwrap();
        let exp = payload.get("exp").and_then(serde_json::Value::as_i64).unwrap();
        assert_eq!(exp - iat, 7200);
    }
}

//! Builders for remotely issued test tokens.
//!
//! Tokens are signed RS256 with the fixture private key from
//! [`crate::crypto_fixtures`], so they verify against [`crate::jwks_document`]
//! served from a mock key-set endpoint.

use crate::crypto_fixtures::{TEST_RSA_KID, TEST_RSA_PRIVATE_KEY_PEM};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::collections::BTreeMap;

/// Builder for an RS256 token as a remote identity provider would mint it.
///
/// Defaults: fixture `kid`, five-minute lifetime, no identity claim.
pub struct RemoteTokenBuilder {
    kid: String,
    issuer: String,
    audience: String,
    expires_in: i64,
    claims: BTreeMap<String, serde_json::Value>,
}

impl RemoteTokenBuilder {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            kid: TEST_RSA_KID.to_string(),
            issuer: issuer.into(),
            audience: audience.into(),
            expires_in: 300,
            claims: BTreeMap::new(),
        }
    }

    /// Set the identity claim.
    #[must_use]
    pub fn for_user(mut self, login_id: &str) -> Self {
        self.claims.insert(
            "userLoginId".to_string(),
            serde_json::Value::String(login_id.to_string()),
        );
        self
    }

    /// Publish under a different key id.
    #[must_use]
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self
    }

    /// Lifetime in seconds from now; negative produces an already-expired
    /// token.
    #[must_use]
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = seconds;
        self
    }

    /// Mark the token as a refresh token.
    #[must_use]
    pub fn refresh(mut self) -> Self {
        self.claims.insert(
            "type".to_string(),
            serde_json::Value::String("refresh".to_string()),
        );
        self
    }

    /// Add an arbitrary string claim.
    #[must_use]
    pub fn with_claim(mut self, name: &str, value: &str) -> Self {
        self.claims.insert(
            name.to_string(),
            serde_json::Value::String(value.to_string()),
        );
        self
    }

    /// Sign the token with the fixture private key.
    ///
    /// # Panics
    ///
    /// Panics on signing failure; test fixture keys are known-good.
    #[must_use]
    pub fn build(self) -> String {
        let now = Utc::now().timestamp();
        let mut payload = serde_json::Map::new();
        payload.insert("iss".to_string(), serde_json::json!(self.issuer));
        payload.insert("aud".to_string(), serde_json::json!(self.audience));
        payload.insert("iat".to_string(), serde_json::json!(now));
        payload.insert("exp".to_string(), serde_json::json!(now + self.expires_in));
        for (name, value) in self.claims {
            payload.insert(name, value);
        }

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid);

        let key = EncodingKey::from_rsa_pem(TEST_RSA_PRIVATE_KEY_PEM.as_bytes())
            .expect("fixture private key must parse");
        encode(&header, &serde_json::Value::Object(payload), &key)
            .expect("fixture token must sign")
    }
}

/// A valid access token for `login_id`, issued by `issuer` for `audience`.
#[must_use]
pub fn remote_token(issuer: &str, audience: &str, login_id: &str) -> String {
    RemoteTokenBuilder::new(issuer, audience)
        .for_user(login_id)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    #[test]
    fn test_builder_produces_three_part_token_with_kid() {
        let token = remote_token("https://idp.test/realms/acme", "webapp", "alice");
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header_bytes = URL_SAFE_NO_PAD.decode(parts[0]).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header_bytes).unwrap();
        assert_eq!(header["kid"], crate::TEST_RSA_KID);
        assert_eq!(header["alg"], "RS256");
    }

    #[test]
    fn test_refresh_marker_and_claims_present() {
        let token = RemoteTokenBuilder::new("https://idp.test", "webapp")
            .for_user("bob")
            .refresh()
            .with_claim("dept", "sales")
            .build();

        let parts: Vec<&str> = token.split('.').collect();
        let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).unwrap();
        assert_eq!(payload["userLoginId"], "bob");
        assert_eq!(payload["type"], "refresh");
        assert_eq!(payload["dept"], "sales");
        assert_eq!(payload["aud"], "webapp");
    }
}

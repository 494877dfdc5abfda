//! Claim sets carried by SSO tokens.
//!
//! A claim set is a flat string-to-string map. Access tokens always carry the
//! identity claim (`userLoginId`); refresh tokens additionally carry the
//! `type=refresh` marker. Registered JWT claims (`iss`, `iat`, `exp`) are
//! handled by the codec and never appear in a decoded `ClaimSet`.

use std::collections::BTreeMap;
use std::fmt;

/// Identity claim present in every token this subsystem issues.
pub const CLAIM_USER_LOGIN_ID: &str = "userLoginId";

/// Token class marker claim.
pub const CLAIM_TOKEN_TYPE: &str = "type";

/// Marker value distinguishing refresh tokens from access tokens.
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Flat, uniquely-keyed string claims.
///
/// Treated as immutable once produced by token decoding; `insert` exists for
/// the issuance side only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClaimSet(BTreeMap<String, String>);

impl ClaimSet {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Claim set for an access token identifying `login_id`.
    #[must_use]
    pub fn for_user(login_id: &str) -> Self {
        let mut claims = Self::new();
        claims.insert(CLAIM_USER_LOGIN_ID, login_id);
        claims
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The identity claim, when present.
    #[must_use]
    pub fn user_login_id(&self) -> Option<&str> {
        self.get(CLAIM_USER_LOGIN_ID)
    }

    /// Whether this claim set marks a refresh token.
    #[must_use]
    pub fn is_refresh(&self) -> bool {
        self.get(CLAIM_TOKEN_TYPE) == Some(TOKEN_TYPE_REFRESH)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The identity claim value is redacted: claim sets end up in debug logs and
/// login ids should not.
impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.0 {
            if name == CLAIM_USER_LOGIN_ID {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_for_user_sets_identity_claim() {
        let claims = ClaimSet::for_user("alice");
        assert_eq!(claims.user_login_id(), Some("alice"));
        assert!(!claims.is_refresh());
    }

    #[test]
    fn test_is_refresh_requires_marker_value() {
        let mut claims = ClaimSet::for_user("alice");
        assert!(!claims.is_refresh());

        claims.insert(CLAIM_TOKEN_TYPE, "access");
        assert!(!claims.is_refresh());

        claims.insert(CLAIM_TOKEN_TYPE, TOKEN_TYPE_REFRESH);
        assert!(claims.is_refresh());
    }

    #[test]
    fn test_keys_are_unique() {
        let mut claims = ClaimSet::new();
        claims.insert("dept", "sales");
        claims.insert("dept", "support");
        assert_eq!(claims.len(), 1);
        assert_eq!(claims.get("dept"), Some("support"));
    }

    #[test]
    fn test_debug_redacts_login_id() {
        let mut claims = ClaimSet::for_user("alice");
        claims.insert("dept", "sales");

        let debug_str = format!("{claims:?}");
        assert!(!debug_str.contains("alice"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("sales"));
    }

    #[test]
    fn test_from_iterator() {
        let claims: ClaimSet = vec![
            ("userLoginId".to_string(), "bob".to_string()),
            ("type".to_string(), "refresh".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(claims.user_login_id(), Some("bob"));
        assert!(claims.is_refresh());
    }
}

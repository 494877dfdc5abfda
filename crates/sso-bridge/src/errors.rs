use crate::jwks::KeyResolverError;
use thiserror::Error;

/// Errors surfaced by the SSO token subsystem.
///
/// Verification failures are expected, non-fatal outcomes: callers at the
/// request boundary convert them to a pass-through result instead of
/// propagating them further. Configuration errors are fatal to the operation
/// attempted and are never retried.
#[derive(Debug, Error)]
pub enum SsoError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Token verification failed: {0}")]
    Verification(String),

    #[error(transparent)]
    KeyResolution(#[from] KeyResolverError),

    #[error("Not a refresh token")]
    NotRefreshToken,

    #[error("Refresh token presented where an access token is required")]
    RefreshTokenNotAllowed,

    #[error("User store error: {0}")]
    UserStore(String),
}

impl SsoError {
    /// Bounded error category label for metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            SsoError::Configuration(_) => "configuration",
            SsoError::Crypto(_) => "cryptographic",
            SsoError::Verification(_) => "verification",
            SsoError::KeyResolution(_) => "key_resolution",
            SsoError::NotRefreshToken | SsoError::RefreshTokenNotAllowed => "token_class",
            SsoError::UserStore(_) => "user_store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_are_bounded() {
        let cases = [
            (SsoError::Configuration("x".into()), "configuration"),
            (SsoError::Crypto("x".into()), "cryptographic"),
            (SsoError::Verification("x".into()), "verification"),
            (SsoError::NotRefreshToken, "token_class"),
            (SsoError::RefreshTokenNotAllowed, "token_class"),
            (SsoError::UserStore("x".into()), "user_store"),
        ];
        for (err, label) in cases {
            assert_eq!(err.category(), label);
        }
    }

    #[test]
    fn test_key_resolution_category() {
        let err = SsoError::from(KeyResolverError::RateLimited);
        assert_eq!(err.category(), "key_resolution");
    }
}

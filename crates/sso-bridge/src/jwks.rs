//! Key Resolver: fetches and caches token-verification keys published by
//! remote issuers.
//!
//! Each tenant gets one [`JwkProvider`] for the lifetime of the process,
//! created on first use and never torn down. A provider caches decoded keys
//! by `kid` (24h TTL, 10-key LRU cap) and rate-limits endpoint fetches to 10
//! per sliding minute. The cache is a performance and availability layer;
//! configuration stays the source of trust.

use crate::observability::metrics::record_jwks_fetch;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// How long a fetched key stays valid in the cache.
pub const KEY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum number of keys cached per provider. Least-recently-used keys are
/// evicted first.
pub const MAX_CACHED_KEYS: usize = 10;

/// Maximum endpoint fetches per provider within [`FETCH_RATE_WINDOW`].
pub const MAX_FETCHES_PER_WINDOW: usize = 10;

/// Sliding window for the fetch rate limit.
pub const FETCH_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Well-known key-set path appended to the issuer URL.
pub const CERTS_PATH: &str = "/protocol/openid-connect/certs";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from key resolution.
#[derive(Debug, Error)]
pub enum KeyResolverError {
    /// Remote trust is configured but the issuer URL is empty.
    #[error("Remote trust configured without an issuer URL")]
    MissingIssuer,

    /// The HTTP client could not be constructed.
    #[error("Failed to build key-fetch HTTP client: {0}")]
    Client(String),

    /// The key id is not present in the issuer's published key set.
    #[error("Key not found in issuer key set: kid={kid}")]
    KeyNotFound { kid: String },

    /// The per-provider fetch budget for the current window is exhausted.
    #[error("Key-set fetch rate limit exceeded")]
    RateLimited,

    /// The key-set endpoint could not be reached or returned an error.
    #[error("Failed to fetch key set from {url}: {error}")]
    FetchFailed { url: String, error: String },

    /// The key-set response was not a parseable JWK set.
    #[error("Failed to parse key set from {url}: {error}")]
    ParseFailed { url: String, error: String },
}

/// The key-set endpoint for an issuer.
///
/// Trailing slashes on the issuer URL are tolerated.
#[must_use]
pub fn jwks_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), CERTS_PATH)
}

struct CachedKey {
    key: DecodingKey,
    fetched_at: Instant,
    last_used: Instant,
}

#[derive(Default)]
struct ProviderState {
    keys: HashMap<String, CachedKey>,
    /// Timestamps of fetches within the current rate window, oldest first.
    fetch_log: VecDeque<Instant>,
}

impl ProviderState {
    /// Look up a cached, unexpired key and refresh its usage stamp.
    fn cached_key(&mut self, kid: &str, now: Instant) -> Option<DecodingKey> {
        match self.keys.get_mut(kid) {
            Some(entry) if now.duration_since(entry.fetched_at) < KEY_CACHE_TTL => {
                entry.last_used = now;
                Some(entry.key.clone())
            }
            _ => None,
        }
    }

    /// Check the fetch budget and, when there is room, record the attempt.
    ///
    /// The attempt is stamped before the fetch happens, so failed fetches
    /// consume budget too.
    fn try_record_fetch(&mut self, now: Instant) -> Result<(), KeyResolverError> {
        while let Some(front) = self.fetch_log.front() {
            if now.duration_since(*front) >= FETCH_RATE_WINDOW {
                self.fetch_log.pop_front();
            } else {
                break;
            }
        }
        if self.fetch_log.len() >= MAX_FETCHES_PER_WINDOW {
            return Err(KeyResolverError::RateLimited);
        }
        self.fetch_log.push_back(now);
        Ok(())
    }

    /// Merge freshly fetched keys into the cache, evicting least-recently
    /// used entries beyond the cap.
    ///
    /// `wanted_kid` is the key the caller is about to look up; it is never
    /// evicted, so an oversized key set cannot push out the one key this
    /// fetch was for.
    fn insert_keys(&mut self, jwk_set: &JwkSet, now: Instant, wanted_kid: &str) {
        for jwk in &jwk_set.keys {
            let Some(kid) = &jwk.common.key_id else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    self.keys.insert(
                        kid.clone(),
                        CachedKey {
                            key,
                            fetched_at: now,
                            last_used: now,
                        },
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        target: "sso.jwks",
                        kid = kid.as_str(),
                        error = %e,
                        "Skipping unusable key in fetched key set"
                    );
                }
            }
        }

        while self.keys.len() > MAX_CACHED_KEYS {
            let oldest = self
                .keys
                .iter()
                .filter(|(kid, _)| kid.as_str() != wanted_kid)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(kid, _)| kid.clone());
            match oldest {
                Some(kid) => {
                    self.keys.remove(&kid);
                }
                None => break,
            }
        }
    }
}

/// Key cache and fetcher for a single issuer.
///
/// Lives for the process lifetime once created. The state lock is never held
/// across a network fetch.
pub struct JwkProvider {
    jwks_url: String,
    client: reqwest::Client,
    state: Mutex<ProviderState>,
}

impl JwkProvider {
    fn new(issuer: &str, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url(issuer),
            client,
            state: Mutex::new(ProviderState::default()),
        }
    }

    /// Resolve the verification key for `kid`.
    ///
    /// Serves from cache when the key is present and unexpired; otherwise
    /// fetches the issuer's key set, subject to the rate limit.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, KeyResolverError> {
        let now = Instant::now();
        {
            let mut state = self.state.lock().await;
            if let Some(key) = state.cached_key(kid, now) {
                return Ok(key);
            }
            if let Err(e) = state.try_record_fetch(now) {
                record_jwks_fetch("rate_limited");
                return Err(e);
            }
        }

        let jwk_set = match self.fetch_key_set().await {
            Ok(set) => {
                record_jwks_fetch("success");
                set
            }
            Err(e) => {
                record_jwks_fetch("error");
                tracing::warn!(
                    target: "sso.jwks",
                    jwks_url = self.jwks_url.as_str(),
                    error = %e,
                    "Key-set fetch failed"
                );
                return Err(e);
            }
        };

        let mut state = self.state.lock().await;
        state.insert_keys(&jwk_set, Instant::now(), kid);
        state
            .cached_key(kid, Instant::now())
            .ok_or_else(|| KeyResolverError::KeyNotFound {
                kid: kid.to_string(),
            })
    }

    async fn fetch_key_set(&self) -> Result<JwkSet, KeyResolverError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeyResolverError::FetchFailed {
                url: self.jwks_url.clone(),
                error: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(KeyResolverError::FetchFailed {
                url: self.jwks_url.clone(),
                error: format!("HTTP {}", response.status()),
            });
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeyResolverError::ParseFailed {
                url: self.jwks_url.clone(),
                error: e.to_string(),
            })
    }
}

/// Process-wide registry of per-tenant key providers.
///
/// Providers are created at most once per tenant: a read-locked fast path
/// followed by a write-locked re-check on miss.
pub struct KeyResolver {
    client: reqwest::Client,
    providers: RwLock<HashMap<String, Arc<JwkProvider>>>,
}

impl KeyResolver {
    /// Build a resolver with its shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `KeyResolverError::Client` when the HTTP client cannot be
    /// constructed.
    pub fn new() -> Result<Self, KeyResolverError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| KeyResolverError::Client(e.to_string()))?;
        Ok(Self {
            client,
            providers: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve the verification key for `kid` from `issuer`, using the
    /// tenant's cached provider.
    ///
    /// # Errors
    ///
    /// `MissingIssuer` for an empty issuer URL; otherwise whatever the
    /// provider's lookup returns.
    pub async fn resolve(
        &self,
        tenant_id: &str,
        issuer: &str,
        kid: &str,
    ) -> Result<DecodingKey, KeyResolverError> {
        if issuer.is_empty() {
            return Err(KeyResolverError::MissingIssuer);
        }
        let provider = self.provider_for(tenant_id, issuer).await;
        provider.key_for(kid).await
    }

    async fn provider_for(&self, tenant_id: &str, issuer: &str) -> Arc<JwkProvider> {
        {
            let providers = self.providers.read().await;
            if let Some(provider) = providers.get(tenant_id) {
                return Arc::clone(provider);
            }
        }

        let mut providers = self.providers.write().await;
        // Re-check: another task may have created the provider while we
        // waited for the write lock.
        if let Some(provider) = providers.get(tenant_id) {
            return Arc::clone(provider);
        }
        let provider = Arc::new(JwkProvider::new(issuer, self.client.clone()));
        providers.insert(tenant_id.to_string(), Arc::clone(&provider));
        tracing::debug!(
            target: "sso.jwks",
            tenant_id = tenant_id,
            jwks_url = provider.jwks_url.as_str(),
            "Created key provider for tenant"
        );
        provider
    }

    /// Number of tenants with a live provider. Exposed for tests and
    /// startup logging.
    pub async fn provider_count(&self) -> usize {
        self.providers.read().await.len()
    }
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TEST_MODULUS: &str = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";

    fn rsa_jwk(kid: Option<&str>) -> serde_json::Value {
        let mut jwk = serde_json::json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "n": TEST_MODULUS,
            "e": "AQAB",
        });
        if let Some(kid) = kid {
            jwk["kid"] = serde_json::json!(kid);
        }
        jwk
    }

    fn jwk_set(kids: &[&str]) -> JwkSet {
        let keys: Vec<serde_json::Value> = kids.iter().map(|kid| rsa_jwk(Some(kid))).collect();
        serde_json::from_value(serde_json::json!({ "keys": keys })).unwrap()
    }

    #[test]
    fn test_jwks_url_appends_well_known_path() {
        assert_eq!(
            jwks_url("https://idp.example.com/realms/acme"),
            "https://idp.example.com/realms/acme/protocol/openid-connect/certs"
        );
    }

    #[test]
    fn test_jwks_url_tolerates_trailing_slash() {
        assert_eq!(
            jwks_url("https://idp.example.com/realms/acme/"),
            "https://idp.example.com/realms/acme/protocol/openid-connect/certs"
        );
    }

    #[test]
    fn test_insert_keys_indexes_by_kid() {
        let mut state = ProviderState::default();
        state.insert_keys(&jwk_set(&["key-1", "key-2"]), Instant::now(), "key-1");

        assert_eq!(state.keys.len(), 2);
        assert!(state.keys.contains_key("key-1"));
        assert!(state.keys.contains_key("key-2"));
    }

    #[test]
    fn test_insert_keys_skips_keys_without_kid() {
        let set: JwkSet =
            serde_json::from_value(serde_json::json!({ "keys": [rsa_jwk(None)] })).unwrap();
        let mut state = ProviderState::default();
        state.insert_keys(&set, Instant::now(), "any-kid");
        assert!(state.keys.is_empty());
    }

    #[test]
    fn test_insert_keys_evicts_least_recently_used() {
        let mut state = ProviderState::default();
        let base = Instant::now();
        state.insert_keys(&jwk_set(&["old-key"]), base, "old-key");

        // Touch the old key so it is recently used, then overflow the cap.
        let touch = base + Duration::from_secs(1);
        assert!(state.cached_key("old-key", touch).is_some());

        let kids: Vec<String> = (0..MAX_CACHED_KEYS).map(|i| format!("new-{i}")).collect();
        let kid_refs: Vec<&str> = kids.iter().map(String::as_str).collect();
        state.insert_keys(&jwk_set(&kid_refs), base, "new-0");

        assert_eq!(state.keys.len(), MAX_CACHED_KEYS);
        // The batch inserted at `base` is older than the touched key.
        assert!(state.keys.contains_key("old-key"));
    }

    #[test]
    fn test_oversized_key_set_keeps_the_wanted_kid() {
        let mut state = ProviderState::default();
        let now = Instant::now();

        // Every key in the batch shares the same usage stamp, so eviction
        // order among them is arbitrary. The looked-up kid must survive.
        let kids: Vec<String> = (0..MAX_CACHED_KEYS + 5).map(|i| format!("key-{i}")).collect();
        let kid_refs: Vec<&str> = kids.iter().map(String::as_str).collect();
        state.insert_keys(&jwk_set(&kid_refs), now, "key-12");

        assert_eq!(state.keys.len(), MAX_CACHED_KEYS);
        assert!(state.cached_key("key-12", now).is_some());
    }

    #[test]
    fn test_cached_key_expires_after_ttl() {
        let mut state = ProviderState::default();
        let fetched = Instant::now();
        state.insert_keys(&jwk_set(&["key-1"]), fetched, "key-1");

        assert!(state.cached_key("key-1", fetched).is_some());
        let after_ttl = fetched + KEY_CACHE_TTL + Duration::from_secs(1);
        assert!(state.cached_key("key-1", after_ttl).is_none());
    }

    #[test]
    fn test_fetch_budget_is_bounded_per_window() {
        let mut state = ProviderState::default();
        let now = Instant::now();

        for _ in 0..MAX_FETCHES_PER_WINDOW {
            assert!(state.try_record_fetch(now).is_ok());
        }
        assert!(matches!(
            state.try_record_fetch(now),
            Err(KeyResolverError::RateLimited)
        ));
    }

    #[test]
    fn test_fetch_budget_recovers_after_window() {
        let mut state = ProviderState::default();
        let start = Instant::now();

        for _ in 0..MAX_FETCHES_PER_WINDOW {
            assert!(state.try_record_fetch(start).is_ok());
        }
        let later = start + FETCH_RATE_WINDOW;
        assert!(state.try_record_fetch(later).is_ok());
    }

    #[tokio::test]
    async fn test_resolver_rejects_empty_issuer() {
        let resolver = KeyResolver::new().unwrap();
        let result = resolver.resolve("tenant-a", "", "some-kid").await;
        assert!(matches!(result, Err(KeyResolverError::MissingIssuer)));
    }

    #[tokio::test]
    async fn test_provider_created_once_per_tenant() {
        let resolver = KeyResolver::new().unwrap();
        let issuer = "https://idp.example.com/realms/acme";

        let first = resolver.provider_for("tenant-a", issuer).await;
        let second = resolver.provider_for("tenant-a", issuer).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.provider_count().await, 1);

        let other = resolver.provider_for("tenant-b", issuer).await;
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(resolver.provider_count().await, 2);
    }
}

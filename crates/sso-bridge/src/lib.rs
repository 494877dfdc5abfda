//! Single-sign-on token issuance and validation.
//!
//! This crate bridges authenticated sessions between independently deployed
//! application servers. It mints signed, time-bounded identity tokens,
//! validates inbound tokens under two mutually exclusive trust modes
//! (shared-secret HMAC or remotely published asymmetric keys), maintains a
//! per-tenant cache of remote verification keys with bounded fetch rate and
//! TTL, and reconciles the validated identity against the local session and
//! tenant context.
//!
//! # Structure
//!
//! - [`codec`] — issue and verify tokens (pure computations).
//! - [`jwks`] — per-tenant remote key resolution and caching.
//! - [`validator`] — trust-mode selection and token-class discrimination.
//! - [`refresh`] — minting of long-lived refresh tokens.
//! - [`bridge`] — the fail-open request state machine.
//! - [`config`] / [`claims`] / [`errors`] — supporting types.
//!
//! The HTTP transport, the user store and tenant configuration storage are
//! external collaborators reached through the traits in [`bridge`].

pub mod bridge;
pub mod claims;
pub mod codec;
pub mod config;
pub mod errors;
pub mod jwks;
pub mod observability;
pub mod refresh;
pub mod validator;

pub use bridge::{BridgeOutcome, SessionContext, SkipReason, SsoBridge, TenantDirectory, UserRecord, UserStore};
pub use claims::ClaimSet;
pub use config::{TenantSecurityConfig, TrustMode};
pub use errors::SsoError;
pub use jwks::{KeyResolver, KeyResolverError};
pub use refresh::issue_refresh_token;
pub use validator::TokenValidator;

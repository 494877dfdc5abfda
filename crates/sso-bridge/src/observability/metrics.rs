//! Metrics definitions for the SSO token subsystem.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sso_` prefix for this subsystem
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `class`: 2 values (access, refresh)
//! - `mode`: 2 values (local, remote)
//! - `outcome`: bounded by code (success plus the error categories, or the
//!   bridge skip reasons)
//!
//! Tenant ids are deliberately not a label.

use metrics::counter;

/// Record a token issuance attempt.
///
/// Metric: `sso_token_issuance_total`
/// Labels: `class`, `outcome`
pub fn record_token_issuance(class: &str, outcome: &str) {
    counter!("sso_token_issuance_total", "class" => class.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Record a token validation result.
///
/// Metric: `sso_token_validations_total`
/// Labels: `mode`, `outcome`
pub fn record_token_validation(mode: &str, outcome: &str) {
    counter!("sso_token_validations_total", "mode" => mode.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Record a key-set fetch attempt against a remote issuer.
///
/// Metric: `sso_jwks_fetch_total`
/// Labels: `outcome` (success, error, rate_limited)
pub fn record_jwks_fetch(outcome: &str) {
    counter!("sso_jwks_fetch_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record the terminal outcome of one bridge run.
///
/// Metric: `sso_bridge_outcomes_total`
/// Labels: `outcome` (authenticated, or a skip-reason label)
pub fn record_bridge_outcome(outcome: &str) {
    counter!("sso_bridge_outcomes_total", "outcome" => outcome.to_string()).increment(1);
}

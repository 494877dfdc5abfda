//! # SSO Test Utilities
//!
//! Shared test utilities for the SSO token subsystem.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (a fixed RSA keypair and its JWK document)
//! - Token builders for remotely issued RS256 tokens
//! - In-memory fakes for the external user store and tenant directory
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sso_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let token = RemoteTokenBuilder::new("https://idp.test/realms/acme", "webapp")
//!         .for_user("alice")
//!         .build();
//!
//!     let store = InMemoryUserStore::new().with_user(enabled_user("alice", "tenant-a"));
//! }
//! ```

pub mod crypto_fixtures;
pub mod stores;
pub mod token_builders;

pub use crypto_fixtures::*;
pub use stores::*;
pub use token_builders::*;

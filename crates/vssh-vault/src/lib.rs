// ABOUTME: Vault backend crate for vssh.
// ABOUTME: Exposes the session trait, the HTTP client and the on-disk token store.

pub mod client;
pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use client::VaultClient;
pub use error::{Result, VaultError};
pub use session::{ttl_from_lookup, OidcChallenge, VaultSession, MIN_TOKEN_TTL};
pub use store::TokenStore;
pub use token::SessionToken;

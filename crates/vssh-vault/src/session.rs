// ABOUTME: The backend session seam used by authentication and certificate signing.
// ABOUTME: VaultClient implements it over HTTP; tests substitute scripted sessions.

use crate::error::Result;
use crate::token::SessionToken;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Tokens with less remaining time than this are treated as invalid.
pub const MIN_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Result of starting an OIDC login: the URL the operator opens and the
/// opaque state to hand back on callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcChallenge {
    pub auth_url: Url,
    pub state: Option<String>,
}

/// Operations the broker needs from the secret backend.
#[async_trait]
pub trait VaultSession: Send + Sync {
    /// The token installed for subsequent calls, if any.
    fn token(&self) -> Option<&SessionToken>;

    /// Install a token for subsequent calls.
    fn set_token(&mut self, token: SessionToken);

    /// Self-lookup gate: true only when a token is set and has at least
    /// [`MIN_TOKEN_TTL`] remaining. Never errors.
    async fn is_token_valid(&self) -> bool;

    /// Sign `public_key` with `<mount>/sign/<role>` and return the certificate blob.
    async fn sign(&self, mount: &str, role: &str, public_key: &str, ttl: Duration)
        -> Result<String>;

    /// Log in via `auth/<mount>/login/<identifier>` and return the client token.
    async fn login(&self, mount: &str, identifier: &str, payload: Value) -> Result<SessionToken>;

    /// Request an OIDC authorization URL from `auth/<mount>/oidc/auth_url`.
    async fn oidc_auth_url(&self, mount: &str, role: &str, redirect_uri: &str)
        -> Result<OidcChallenge>;

    /// Complete an OIDC login via `auth/<mount>/oidc/callback`.
    async fn oidc_callback(
        &self,
        mount: &str,
        code: &str,
        state: Option<&str>,
    ) -> Result<SessionToken>;
}

/// Extract the remaining TTL from a token self-lookup `data` section.
///
/// Vault reports `ttl` in seconds; integers, floats and numeric strings are
/// accepted. Negative or non-numeric values yield `None`.
pub fn ttl_from_lookup(data: Option<&Map<String, Value>>) -> Option<Duration> {
    let ttl = data?.get("ttl")?;
    let secs = match ttl {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v as f64)
            .or_else(|| n.as_f64())?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs(secs as u64))
}

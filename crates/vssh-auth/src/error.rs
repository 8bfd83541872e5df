// ABOUTME: Error types for authentication flows using thiserror.
// ABOUTME: Every variant is fatal; there is no retry and no unauthenticated fallback.

use thiserror::Error;
use vssh_config::AuthMethod;
use vssh_vault::VaultError;

/// Errors that can occur while establishing a Vault session.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The operator entered nothing (or only whitespace).
    #[error("{0} cannot be empty")]
    EmptyCredential(&'static str),

    /// A pasted token was rejected by the self-lookup.
    #[error("the provided token is invalid or expires within 5 minutes")]
    InvalidCredential,

    /// The backend rejected a login.
    #[error("{method} authentication failed: {source}")]
    Login {
        method: AuthMethod,
        #[source]
        source: VaultError,
    },

    /// OIDC was selected without `vault.oidc.role`.
    #[error("OIDC role is required; set vault.oidc.role in the config file")]
    MissingRole,

    /// The backend did not hand out an OIDC authorization URL.
    #[error("failed to get OIDC auth URL: {0}")]
    NoAuthUrl(#[source] VaultError),

    /// The method selection prompt got an answer outside 1-4.
    #[error("invalid authentication method choice {0:?}; enter 1-4 or a method name")]
    InvalidChoice(String),

    /// Reading from the terminal failed.
    #[error("failed to read input: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Result type alias using AuthError.
pub type Result<T> = std::result::Result<T, AuthError>;

// ABOUTME: Error types for Vault operations using thiserror.
// ABOUTME: Covers transport, API status, missing response fields and token file I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors that can occur while talking to Vault or handling the token file.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The configured Vault address is not a valid URL.
    #[error("invalid Vault address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    /// Failed to build the HTTP client.
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or the response could not be read.
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// Vault answered with a non-success status.
    #[error("Vault returned {status} for {path}: {message}")]
    Api {
        path: String,
        status: u16,
        message: String,
    },

    /// The response body was not the JSON shape Vault uses.
    #[error("invalid response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A call that needs a token was made without one.
    #[error("no Vault token set")]
    NoToken,

    /// The signing endpoint returned no data section.
    #[error("no data returned from Vault SSH signing at {path}")]
    SignNoData { path: String },

    /// The signing response had no `signed_key`.
    #[error("signed_key not found in Vault response from {path}")]
    SignMissingKey { path: String },

    /// A login call returned no auth section.
    #[error("no authentication data returned from {path}")]
    NoAuthData { path: String },

    /// The OIDC endpoint did not return a usable authorization URL.
    #[error("no valid OIDC auth URL returned from {path}")]
    NoAuthUrl { path: String },

    /// The token file does not exist.
    #[error("token file {path} not found")]
    TokenNotFound { path: PathBuf },

    /// The token file exists but is blank.
    #[error("token file {path} is empty")]
    EmptyToken { path: PathBuf },

    /// Failed to read the token file.
    #[error("failed to read token file {path}: {source}")]
    ReadToken {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the token file.
    #[error("failed to write token file {path}: {source}")]
    WriteToken {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a directory.
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

impl VaultError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build an API error from a non-success response, preferring Vault's `errors` array.
    pub fn from_status(path: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
            _ if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string(),
            _ => Self::truncate_body(body.trim()),
        };

        VaultError::Api {
            path: path.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

/// Result type alias using VaultError.
pub type Result<T> = std::result::Result<T, VaultError>;

// ABOUTME: Error types for certificate and ssh session operations using thiserror.
// ABOUTME: Carries key paths and signing roles so failures point at what to fix.

use std::path::PathBuf;
use thiserror::Error;
use vssh_vault::VaultError;

/// Errors that can occur while preparing a certificate or running ssh.
#[derive(Error, Debug)]
pub enum SshError {
    /// The private key or its `.pub` companion is missing.
    #[error("SSH key not found at {path}")]
    KeyNotFound { path: PathBuf },

    /// Failed to read a key file from disk.
    #[error("failed to read SSH key from {path}: {source}")]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a certificate file from disk.
    #[error("failed to read certificate from {path}: {source}")]
    ReadCertificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The certificate file is not an OpenSSH certificate.
    #[error("failed to parse certificate from {path}: {source}")]
    ParseCertificate {
        path: PathBuf,
        #[source]
        source: ssh_key::Error,
    },

    /// The backend refused or failed to sign the public key.
    #[error("failed to sign SSH key with role {role}: {source}")]
    Sign {
        role: String,
        #[source]
        source: VaultError,
    },

    /// Failed to write the signed certificate.
    #[error("failed to write certificate to {path}: {source}")]
    WriteCertificate {
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

    /// Failed to set file permissions.
    #[error("failed to set permissions on {path}: {source}")]
    SetPermissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The identity name cannot be used to build file names.
    #[error("invalid identity name {name:?}")]
    InvalidIdentity { name: String },

    /// The `[user@]host` argument could not be parsed.
    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// The ssh client is not installed or not on PATH.
    #[error("{binary} not found in PATH; install an OpenSSH client (e.g. openssh-client) and retry")]
    BinaryNotFound { binary: String },

    /// The ssh client could not be started.
    #[error("failed to run {binary}: {source}")]
    Launch {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The ssh client exited unsuccessfully.
    #[error("ssh exited with status {code}")]
    ConnectionFailed { code: u8 },
}

/// Result type alias using SshError.
pub type Result<T> = std::result::Result<T, SshError>;

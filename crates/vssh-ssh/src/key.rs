// ABOUTME: Key and certificate file naming for SSH identities.
// ABOUTME: Derives .pub companions and reads public keys for signing.

use crate::error::{Result, SshError};
use std::path::{Path, PathBuf};

/// Key file used when an identity has no configured private key.
pub const DEFAULT_PRIVATE_KEY: &str = "id_rsa";

/// File name of the signed certificate for `name`.
///
/// Other tooling looks for this exact name, so it must not change.
pub fn certificate_file_name(name: &str) -> String {
    format!("vault_signed_{name}.pub")
}

/// The public key that belongs to `private_key`: the same path with `.pub` appended.
///
/// Unlike `Path::with_extension`, a key named `alice.key` maps to `alice.key.pub`.
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut path = private_key.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

/// Read the OpenSSH public key text to submit for signing.
///
/// # Errors
/// `KeyNotFound` if the file does not exist, `ReadKey` for other I/O failures.
pub fn read_public_key(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SshError::KeyNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SshError::ReadKey {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })
}

// ABOUTME: SSH crate for vssh.
// ABOUTME: Certificate validity, signing through Vault, target parsing and launching ssh.

pub mod certificate;
pub mod error;
pub mod key;
pub mod launcher;
pub mod manager;
pub mod target;

pub use certificate::{unix_now, SignedCertificate, SAFETY_MARGIN};
pub use error::{Result, SshError};
pub use key::{certificate_file_name, public_key_path};
pub use launcher::{SessionLauncher, SshOptions};
pub use manager::{CertificateManager, Identity};
pub use target::SshTarget;

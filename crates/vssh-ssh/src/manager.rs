// ABOUTME: Certificate gate: reuse a cached signed certificate or obtain a new one.
// ABOUTME: Resolves identities to key paths and signing roles from configuration.

use crate::certificate::{unix_now, SignedCertificate};
use crate::error::{Result, SshError};
use crate::key::{certificate_file_name, public_key_path, read_public_key, DEFAULT_PRIVATE_KEY};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vssh_config::Config;
use vssh_vault::VaultSession;

/// Who we connect as: the name, the private key used and the role it is signed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub private_key: PathBuf,
    pub role: String,
}

/// Ensures a fresh signed certificate exists for an identity.
pub struct CertificateManager<'a, S: VaultSession> {
    session: &'a S,
    config: &'a Config,
}

impl<'a, S: VaultSession> CertificateManager<'a, S> {
    pub fn new(session: &'a S, config: &'a Config) -> Self {
        Self { session, config }
    }

    /// `<key_directory>/vault_signed_<name>.pub`
    pub fn certificate_path(&self, name: &str) -> PathBuf {
        self.config
            .ssh
            .key_directory()
            .join(certificate_file_name(name))
    }

    /// The configured private key for `name`, else `<key_directory>/id_rsa`.
    pub fn private_key_path(&self, name: &str) -> PathBuf {
        match self.config.user(name) {
            Some(user) => user.private_key(),
            None => self.config.ssh.key_directory().join(DEFAULT_PRIVATE_KEY),
        }
    }

    /// The per-user `vault_role` override, else the name itself.
    pub fn signing_role(&self, name: &str) -> String {
        self.config
            .user(name)
            .and_then(|user| user.vault_role())
            .unwrap_or(name)
            .to_string()
    }

    /// Resolve everything needed to sign and connect as `name`.
    pub fn identity(&self, name: &str) -> Result<Identity> {
        if name.trim().is_empty() || name.contains('/') || name.contains('\0') {
            return Err(SshError::InvalidIdentity {
                name: name.to_string(),
            });
        }

        Ok(Identity {
            name: name.to_string(),
            private_key: self.private_key_path(name),
            role: self.signing_role(name),
        })
    }

    /// Whether the certificate at `path` can be reused right now. Never fails.
    pub fn is_certificate_valid(&self, path: &Path) -> bool {
        let cert = match SignedCertificate::load(path) {
            Ok(cert) => cert,
            Err(e) => {
                debug!(error = %e, "No usable certificate");
                return false;
            }
        };

        let now = unix_now();
        if !cert.is_usable_at(now) {
            debug!(
                path = %path.display(),
                not_before = cert.not_before(),
                not_after = cert.not_after(),
                now,
                "Certificate is expired, not yet valid or expiring soon"
            );
            return false;
        }

        debug!(
            path = %path.display(),
            remaining_secs = cert.remaining_at(now).map(|d| d.as_secs()).unwrap_or_default(),
            "Certificate is valid"
        );
        true
    }

    /// Return the path of a usable certificate for `identity`, signing a new one if needed.
    pub async fn ensure_certificate(&self, identity: &Identity) -> Result<PathBuf> {
        let cert_path = self.certificate_path(&identity.name);
        if self.is_certificate_valid(&cert_path) {
            return Ok(cert_path);
        }

        let public_key = public_key_path(&identity.private_key);
        for path in [&identity.private_key, &public_key] {
            if !path.exists() {
                return Err(SshError::KeyNotFound { path: path.clone() });
            }
        }
        let public_key_text = read_public_key(&public_key)?;

        let ssh = &self.config.ssh;
        info!(role = %identity.role, "Requesting signed certificate");
        let signed = self
            .session
            .sign(
                &ssh.signing_engine,
                &identity.role,
                &public_key_text,
                ssh.certificate_ttl,
            )
            .await
            .map_err(|e| SshError::Sign {
                role: identity.role.clone(),
                source: e,
            })?;

        write_certificate(&cert_path, &signed)?;

        match SignedCertificate::parse(&signed) {
            Ok(cert) => info!(
                path = %cert_path.display(),
                key_id = cert.key_id(),
                principals = ?cert.principals(),
                expires = cert.expires_at().map(|t| t.to_rfc3339()).as_deref(),
                "Certificate saved"
            ),
            Err(_) => info!(path = %cert_path.display(), "Certificate saved"),
        }

        Ok(cert_path)
    }
}

fn write_certificate(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.exists()) {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(dir).map_err(|e| SshError::CreateDirectory {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(path, contents.as_bytes()).map_err(|e| SshError::WriteCertificate {
        path: path.to_path_buf(),
        source: e,
    })?;

    // Certificates are public material, readable like a .pub key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).map_err(|e| {
            SshError::SetPermissions {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
    }

    Ok(())
}

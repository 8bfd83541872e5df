// ABOUTME: On-disk persistence of the Vault session token.
// ABOUTME: Reads and writes a single trimmed token with owner-only permissions.

use crate::error::{Result, VaultError};
use crate::token::SessionToken;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use vssh_config::TokenConfig;

/// File-backed token storage (`~/.vault-token` by default).
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured `vault.token.token_path`, `~` expanded.
    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(config.token_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted token.
    ///
    /// # Errors
    /// `TokenNotFound` when the file does not exist, `EmptyToken` when it is
    /// blank, `ReadToken` for any other I/O failure.
    pub fn load(&self) -> Result<SessionToken> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VaultError::TokenNotFound {
                    path: self.path.clone(),
                }
            } else {
                VaultError::ReadToken {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;

        let token = SessionToken::new(contents);
        if token.is_empty() {
            return Err(VaultError::EmptyToken {
                path: self.path.clone(),
            });
        }

        debug!(path = %self.path.display(), "Loaded token from file");
        Ok(token)
    }

    /// Persist the token with 0600 permissions, creating the parent directory (0700) if needed.
    pub fn save(&self, token: &SessionToken) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                create_private_dir(parent)?;
            }
        }

        let write_err = |e| VaultError::WriteToken {
            path: self.path.clone(),
            source: e,
        };

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(write_err)?;
        file.write_all(token.expose().as_bytes()).map_err(write_err)?;

        // The mode passed to open() only applies when the file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        debug!(path = %self.path.display(), "Saved token to file");
        Ok(())
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| VaultError::CreateDirectory {
        path: dir.to_path_buf(),
        source: e,
    })
}

// ABOUTME: Default configuration template written by `vssh init`.
// ABOUTME: The template parses back into the default Config apart from the auth method.

use crate::error::{ConfigError, Result};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# vssh configuration file
# See https://github.com/ncecere/vssh for documentation

vault:
  address: "https://vault.example.com"
  auth_method: "token"  # Options: token, userpass, ldap, oidc (leave empty to be asked)
  # namespace: "admin/team"
  timeout: "30s"

  # Token authentication (default)
  token:
    token_path: "~/.vault-token"

  # Username/Password authentication
  # userpass:
  #   username: "your-username"
  #   mount: "userpass"

  # LDAP authentication
  # ldap:
  #   username: "your-username"
  #   mount: "ldap"

  # OIDC authentication
  # oidc:
  #   role: "your-oidc-role"
  #   mount: "oidc"

ssh:
  key_directory: "~/.ssh"
  certificate_ttl: "4h"
  signing_engine: "ssh-client-signer"

# Per-user SSH key configuration
users: {}
  # user1:
  #   private_key: "~/.ssh/user1_rsa"
  #   vault_role: "user1-role"  # Optional: override the default role (the user name)

# Enable debug logging
debug: false
"#;

/// The commented default configuration.
pub fn default_config_yaml() -> &'static str {
    DEFAULT_CONFIG
}

/// Write the default configuration to `path`, refusing to overwrite unless `force`.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(path, DEFAULT_CONFIG).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

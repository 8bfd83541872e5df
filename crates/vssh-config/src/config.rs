// ABOUTME: Configuration types for vssh, loaded from YAML with sensible defaults.
// ABOUTME: Handles env overrides, validation and ~ expansion of configured paths.

use crate::duration;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Authentication methods supported against the Vault backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Token,
    UserPass,
    Ldap,
    Oidc,
}

impl AuthMethod {
    pub const ALL: [AuthMethod; 4] = [
        AuthMethod::Token,
        AuthMethod::UserPass,
        AuthMethod::Ldap,
        AuthMethod::Oidc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Token => "token",
            AuthMethod::UserPass => "userpass",
            AuthMethod::Ldap => "ldap",
            AuthMethod::Oidc => "oidc",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(AuthMethod::Token),
            "userpass" => Ok(AuthMethod::UserPass),
            "ldap" => Ok(AuthMethod::Ldap),
            "oidc" => Ok(AuthMethod::Oidc),
            _ => Err(ConfigError::InvalidAuthMethod(s.to_string())),
        }
    }
}

/// An absent or empty `auth_method` means "ask the operator".
fn deserialize_auth_method<'de, D>(deserializer: D) -> std::result::Result<Option<AuthMethod>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub vault: VaultConfig,
    pub ssh: SshConfig,
    pub users: BTreeMap<String, UserConfig>,
    pub debug: bool,
}

/// Vault server and authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VaultConfig {
    pub address: String,
    #[serde(
        deserialize_with = "deserialize_auth_method",
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_method: Option<AuthMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Per-request timeout for backend calls.
    #[serde(with = "duration::serde_format")]
    pub timeout: Duration,
    pub token: TokenConfig,
    pub userpass: UserPassConfig,
    pub ldap: LdapConfig,
    pub oidc: OidcConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "https://vault.example.com".to_string(),
            auth_method: None,
            namespace: None,
            timeout: Duration::from_secs(30),
            token: TokenConfig::default(),
            userpass: UserPassConfig::default(),
            ldap: LdapConfig::default(),
            oidc: OidcConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenConfig {
    pub token_path: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_path: "~/.vault-token".to_string(),
        }
    }
}

impl TokenConfig {
    /// Token file path with `~` expanded.
    pub fn token_path(&self) -> PathBuf {
        expand_path(&self.token_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserPassConfig {
    pub username: Option<String>,
    pub mount: String,
}

impl Default for UserPassConfig {
    fn default() -> Self {
        Self {
            username: None,
            mount: "userpass".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LdapConfig {
    pub username: Option<String>,
    pub mount: String,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            username: None,
            mount: "ldap".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OidcConfig {
    pub role: Option<String>,
    pub mount: String,
    pub redirect_uri: String,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            role: None,
            mount: "oidc".to_string(),
            redirect_uri: "http://localhost:8250/oidc/callback".to_string(),
        }
    }
}

/// SSH key and signing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshConfig {
    pub key_directory: String,
    #[serde(with = "duration::serde_format")]
    pub certificate_ttl: Duration,
    pub signing_engine: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            key_directory: "~/.ssh".to_string(),
            certificate_ttl: Duration::from_secs(4 * 60 * 60),
            signing_engine: "ssh-client-signer".to_string(),
        }
    }
}

impl SshConfig {
    /// Key directory with `~` expanded.
    pub fn key_directory(&self) -> PathBuf {
        expand_path(&self.key_directory)
    }
}

/// Per-identity overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserConfig {
    pub private_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_role: Option<String>,
}

impl UserConfig {
    /// Private key path with `~` expanded.
    pub fn private_key(&self) -> PathBuf {
        expand_path(&self.private_key)
    }

    /// The configured role override, ignoring blank values.
    pub fn vault_role(&self) -> Option<&str> {
        self.vault_role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl Config {
    /// Parse configuration from YAML text. `path` is only used for error messages.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load config from a YAML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Load, apply process environment overrides and validate.
    pub fn load_validated(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path (~/.config/vssh/config.yaml)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("vssh").join("config.yaml"))
    }

    /// Apply `VAULT_ADDR` and `VAULT_NAMESPACE` overrides. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(address) = non_empty("VAULT_ADDR") {
            self.vault.address = address;
        }
        if let Some(namespace) = non_empty("VAULT_NAMESPACE") {
            self.vault.namespace = Some(namespace);
        }
    }

    /// Validate the configuration, naming the offending field on failure.
    pub fn validate(&self) -> Result<()> {
        if self.vault.address.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "vault.address".to_string(),
            });
        }

        if self.vault.auth_method == Some(AuthMethod::Oidc)
            && self.vault.oidc.role.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(ConfigError::Missing {
                field: "vault.oidc.role".to_string(),
            });
        }

        if self.vault.token.token_path.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "vault.token.token_path".to_string(),
            });
        }

        if self.ssh.key_directory.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "ssh.key_directory".to_string(),
            });
        }

        if self.ssh.signing_engine.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "ssh.signing_engine".to_string(),
            });
        }

        if self.ssh.certificate_ttl.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "ssh.certificate_ttl".to_string(),
            });
        }

        // Vault takes the TTL in seconds.
        if self.ssh.certificate_ttl.subsec_nanos() != 0 {
            return Err(ConfigError::NotWholeSeconds {
                field: "ssh.certificate_ttl".to_string(),
                value: format!("{:?}", self.ssh.certificate_ttl),
            });
        }

        if self.vault.timeout.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "vault.timeout".to_string(),
            });
        }

        for (name, user) in &self.users {
            if user.private_key.trim().is_empty() {
                return Err(ConfigError::Missing {
                    field: format!("users.{name}.private_key"),
                });
            }
        }

        Ok(())
    }

    /// Look up the per-identity overrides.
    pub fn user(&self, name: &str) -> Option<&UserConfig> {
        self.users.get(name)
    }
}

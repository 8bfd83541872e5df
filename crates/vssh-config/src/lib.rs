// ABOUTME: Configuration crate for vssh.
// ABOUTME: Re-exports the config types, duration helpers and the default template.

pub mod config;
pub mod duration;
pub mod error;
pub mod template;

pub use config::{
    expand_path, AuthMethod, Config, LdapConfig, OidcConfig, SshConfig, TokenConfig,
    UserConfig, UserPassConfig, VaultConfig,
};
pub use error::{ConfigError, Result};
pub use template::{default_config_yaml, write_default_config};

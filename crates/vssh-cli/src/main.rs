// ABOUTME: CLI entry point for vssh.
// ABOUTME: Authenticates to Vault, ensures a signed certificate and hands off to ssh.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use vssh_auth::{Authenticator, TerminalPrompter};
use vssh_config::{write_default_config, Config};
use vssh_ssh::{CertificateManager, SessionLauncher, SshError, SshOptions, SshTarget};
use vssh_vault::{SessionToken, TokenStore, VaultClient};

#[derive(Parser)]
#[command(name = "vssh")]
#[command(about = "SSH with short-lived certificates signed by Vault")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    connect: ConnectArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Path to configuration file (defaults to ~/.config/vssh/config.yaml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Path to configuration file (defaults to ~/.config/vssh/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output (debug logs and ssh -v)
    #[arg(short, long)]
    verbose: bool,

    /// Debug output (debug logs and ssh -vvv)
    #[arg(short, long)]
    debug: bool,

    /// Port to connect to on the remote host
    #[arg(short, long)]
    port: Option<u16>,

    /// Force IPv4 addresses only
    #[arg(short = '4')]
    ipv4: bool,

    /// Force IPv6 addresses only
    #[arg(short = '6')]
    ipv6: bool,

    /// Enable agent forwarding
    #[arg(short = 'A')]
    forward_agent: bool,

    /// Force pseudo-terminal allocation
    #[arg(short = 't')]
    force_tty: bool,

    /// Extra ssh option, passed through as -o (repeatable)
    #[arg(short = 'o', value_name = "OPTION")]
    options: Vec<String>,

    /// Destination as [user@]host; the user also selects the key and Vault role
    target: Option<String>,

    /// Command to run on the remote host
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl ConnectArgs {
    fn ssh_options(&self) -> SshOptions {
        let mut extra_args = Vec::new();
        if self.forward_agent {
            extra_args.push("-A".to_string());
        }
        if self.force_tty {
            extra_args.push("-t".to_string());
        }
        for option in &self.options {
            extra_args.push("-o".to_string());
            extra_args.push(option.clone());
        }

        SshOptions {
            port: self.port,
            ipv4: self.ipv4,
            ipv6: self.ipv6,
            verbose: self.verbose,
            debug: self.debug,
            extra_args,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // ssh already reported its own failure; just relay the status.
            if let Some(code) = relayed_exit_code(&e) {
                return ExitCode::from(code);
            }
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// The exit status of a failed ssh session, if that is what ended the run.
fn relayed_exit_code(err: &anyhow::Error) -> Option<u8> {
    match err.downcast_ref::<SshError>() {
        Some(SshError::ConnectionFailed { code }) => Some(*code),
        _ => None,
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Init { config, force }) => run_init(config, force),
        Some(Commands::Version) => {
            print_version();
            Ok(())
        }
        None => run_connect(cli.connect).await,
    }
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Config::default_path().context("could not determine config file location"),
    }
}

/// Write the default configuration file
fn run_init(config: Option<PathBuf>, force: bool) -> Result<()> {
    let path = config_path(config)?;
    write_default_config(&path, force)?;

    println!("{} Wrote {}", "✓".green(), path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set vault.address and your auth method in the file above");
    println!("  2. Connect with: vssh user@host");
    Ok(())
}

/// Authenticate, make sure a certificate is fresh, then run ssh
async fn run_connect(args: ConnectArgs) -> Result<()> {
    let path = config_path(args.config.clone())?;
    let config = Config::load_validated(&path).context("failed to load configuration")?;

    vssh_log::init(args.verbose || args.debug || config.debug);
    debug!(path = %path.display(), "Loaded configuration");

    let target = args
        .target
        .as_deref()
        .context("missing destination; usage: vssh [OPTIONS] [user@]host [command...]")?;
    let target = SshTarget::parse(target)?;

    let ssh_binary = SessionLauncher::new().validate_binary()?;
    debug!(binary = %ssh_binary.display(), "Found ssh client");
    let launcher = SessionLauncher::with_binary(ssh_binary);

    let mut client = VaultClient::new(&config.vault)?;
    debug!(address = %client.address(), "Using Vault");
    let store = TokenStore::from_config(&config.vault.token);
    let env_token = std::env::var("VAULT_TOKEN").ok().map(SessionToken::new);

    Authenticator::new(&mut client, &store, &config.vault, &TerminalPrompter)
        .with_env_token(env_token)
        .ensure_authenticated()
        .await
        .context("Vault authentication failed")?;

    let manager = CertificateManager::new(&client, &config);
    let identity = manager.identity(&target.user)?;
    let certificate = manager.ensure_certificate(&identity).await?;

    info!(%target, "Connecting");
    launcher.connect(
        &target,
        &certificate,
        &identity.private_key,
        &args.ssh_options(),
        &args.command,
    )?;
    Ok(())
}

fn print_version() {
    println!("vssh {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_connection_with_remote_command() {
        let cli = Cli::try_parse_from([
            "vssh", "-p", "2222", "-A", "-o", "ForwardX11=no", "alice@db1", "uptime", "-p",
        ])
        .expect("should parse");

        assert!(cli.command.is_none());
        let args = cli.connect;
        assert_eq!(args.target.as_deref(), Some("alice@db1"));
        assert_eq!(args.command, vec!["uptime", "-p"]);

        let options = args.ssh_options();
        assert_eq!(options.port, Some(2222));
        assert_eq!(options.extra_args, vec!["-A", "-o", "ForwardX11=no"]);
    }

    #[test]
    fn parses_verbosity_and_address_family() {
        let cli = Cli::try_parse_from(["vssh", "-v", "-d", "-4", "-t", "host"]).unwrap();
        let options = cli.connect.ssh_options();
        assert!(options.verbose);
        assert!(options.debug);
        assert!(options.ipv4);
        assert!(!options.ipv6);
        assert_eq!(options.extra_args, vec!["-t"]);
    }

    #[test]
    fn parses_init_subcommand() {
        let cli = Cli::try_parse_from(["vssh", "init", "--force", "--config", "/tmp/v.yaml"])
            .unwrap();
        match cli.command {
            Some(Commands::Init { config, force }) => {
                assert!(force);
                assert_eq!(config, Some(PathBuf::from("/tmp/v.yaml")));
            }
            _ => panic!("expected init"),
        }
    }

    #[test]
    fn parses_version_subcommand() {
        let cli = Cli::try_parse_from(["vssh", "version"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Version)));
    }

    #[test]
    fn no_arguments_shows_help() {
        assert!(Cli::try_parse_from(["vssh"]).is_err());
    }

    #[test]
    fn relays_ssh_exit_status() {
        let err = anyhow::Error::from(SshError::ConnectionFailed { code: 42 });
        assert_eq!(relayed_exit_code(&err), Some(42));

        let err = anyhow::Error::from(SshError::ConnectionFailed { code: 255 });
        assert_eq!(relayed_exit_code(&err), Some(255));

        let err = anyhow::Error::from(SshError::ConnectionFailed { code: 1 }).context("ssh session");
        assert_eq!(relayed_exit_code(&err), Some(1));
    }

    #[test]
    fn other_errors_are_not_relayed() {
        assert_eq!(relayed_exit_code(&anyhow::anyhow!("no config")), None);

        let err = anyhow::Error::from(SshError::InvalidIdentity {
            name: "../x".to_string(),
        });
        assert_eq!(relayed_exit_code(&err), None);
    }
}

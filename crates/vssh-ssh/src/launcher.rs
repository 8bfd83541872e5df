// ABOUTME: Builds the ssh command line and runs the client with inherited stdio.
// ABOUTME: Relays the child's exit status, including signal deaths, to the caller.

use crate::error::{Result, SshError};
use crate::target::SshTarget;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// Options that shape the ssh invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshOptions {
    pub port: Option<u16>,
    pub ipv4: bool,
    pub ipv6: bool,
    /// Adds `-v`.
    pub verbose: bool,
    /// Adds `-vvv`.
    pub debug: bool,
    /// Passed through unchanged before the destination.
    pub extra_args: Vec<String>,
}

/// Runs the system ssh client.
#[derive(Debug, Clone)]
pub struct SessionLauncher {
    binary: PathBuf,
}

impl Default for SessionLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLauncher {
    pub const DEFAULT_BINARY: &'static str = "ssh";

    pub fn new() -> Self {
        Self::with_binary(Self::DEFAULT_BINARY)
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve the ssh binary on PATH (or check an explicit path).
    pub fn validate_binary(&self) -> Result<PathBuf> {
        which::which(&self.binary).map_err(|e| {
            debug!(error = %e, binary = %self.binary.display(), "ssh lookup failed");
            SshError::BinaryNotFound {
                binary: self.binary.display().to_string(),
            }
        })
    }

    /// The argument list passed to ssh, in order.
    pub fn build_args(
        target: &SshTarget,
        certificate: &Path,
        identity_file: &Path,
        options: &SshOptions,
        command: &[String],
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if let Some(port) = options.port {
            args.push("-p".into());
            args.push(port.to_string().into());
        }

        let mut cert_option = OsString::from("CertificateFile=");
        cert_option.push(certificate);
        args.push("-o".into());
        args.push(cert_option);

        args.push("-i".into());
        args.push(identity_file.into());

        if options.ipv4 {
            args.push("-4".into());
        }
        if options.ipv6 {
            args.push("-6".into());
        }
        if options.verbose {
            args.push("-v".into());
        }
        if options.debug {
            args.push("-vvv".into());
        }

        args.push("-o".into());
        args.push("PreferredAuthentications=publickey".into());
        args.push("-o".into());
        args.push("PubkeyAuthentication=yes".into());

        args.extend(options.extra_args.iter().map(OsString::from));
        args.push(target.to_string().into());
        args.extend(command.iter().map(OsString::from));

        args
    }

    /// Run ssh to completion. A non-zero exit becomes `ConnectionFailed` with the same code.
    pub fn connect(
        &self,
        target: &SshTarget,
        certificate: &Path,
        identity_file: &Path,
        options: &SshOptions,
        command: &[String],
    ) -> Result<()> {
        let args = Self::build_args(target, certificate, identity_file, options, command);
        debug!(binary = %self.binary.display(), ?args, "Launching ssh");

        let status = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| SshError::Launch {
                binary: self.binary.clone(),
                source: e,
            })?;

        match failure_code(status) {
            None => Ok(()),
            Some(code) => Err(SshError::ConnectionFailed { code }),
        }
    }
}

/// Exit code to relay for an unsuccessful child, `None` on success.
fn failure_code(status: ExitStatus) -> Option<u8> {
    if status.success() {
        return None;
    }

    if let Some(code) = status.code() {
        return Some(u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(u8::try_from(128 + signal).unwrap_or(u8::MAX));
        }
    }

    Some(1)
}

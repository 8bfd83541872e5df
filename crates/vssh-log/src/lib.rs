// ABOUTME: Shared logging setup for vssh.
// ABOUTME: Logs go to stderr so stdout stays reserved for the remote session.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Pick the default level: DEBUG when verbose output was requested, INFO otherwise.
pub fn default_level(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Build the filter used by [`init`]. A usable `RUST_LOG` replaces the default
/// level entirely, so it can lower the level as well as raise it.
pub fn filter(verbose: bool) -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), verbose)
}

fn filter_from(directives: Option<&str>, verbose: bool) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(default_level(verbose).into()))
}

/// Standard logging to stderr. Default: INFO level (DEBUG when `verbose`),
/// RUST_LOG override.
pub fn init(verbose: bool) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(verbose))
        .with_target(false)
        .init();
}

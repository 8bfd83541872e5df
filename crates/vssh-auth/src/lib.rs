// ABOUTME: Authentication crate for vssh.
// ABOUTME: Gates every connection on a valid Vault token, prompting the operator when needed.

pub mod authenticator;
pub mod error;
pub mod prompt;

pub use authenticator::{Authenticator, PasswordLogin};
pub use error::{AuthError, Result};
pub use prompt::{Prompter, TerminalPrompter};

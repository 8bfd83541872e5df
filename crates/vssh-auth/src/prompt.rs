// ABOUTME: The Prompter capability used by authentication flows.
// ABOUTME: TerminalPrompter talks to the operator on stderr through dialoguer.

use dialoguer::{Input, Password};
use std::io;

/// How authentication flows talk to the operator.
pub trait Prompter {
    /// Show a message.
    fn notify(&self, message: &str);

    /// Ask for a value that may be echoed.
    fn prompt_visible(&self, label: &str) -> io::Result<String>;

    /// Ask for a secret without echo.
    fn prompt_hidden(&self, label: &str) -> io::Result<String>;
}

/// Interactive prompter on the controlling terminal.
///
/// Output goes to stderr so a remote command's stdout stays clean.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }

    fn prompt_visible(&self, label: &str) -> io::Result<String> {
        Input::<String>::new()
            .with_prompt(label)
            .allow_empty(true)
            .interact_text()
            .map_err(|dialoguer::Error::IO(e)| e)
    }

    fn prompt_hidden(&self, label: &str) -> io::Result<String> {
        Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()
            .map_err(|dialoguer::Error::IO(e)| e)
    }
}

use config::{Field, Prompt};
use dialoguer::Input;
use std::io;

/// Asks the user on the terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&mut self, field: &Field, default: Option<&str>) -> io::Result<String> {
        Input::<String>::new()
            .with_prompt(format!(" - {} ({})", field.name, default.unwrap_or_default()))
            .allow_empty(true)
            .interact_text()
            .map_err(io::Error::other)
    }
}

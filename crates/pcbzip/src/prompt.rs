use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use indicatif::ProgressBar;
use inquire::{Confirm, InquireError, Select, Text};

/// Map Esc / Ctrl-C to `None` so callers can treat them as quit
fn cancellable<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn text(message: &str) -> Result<Option<String>> {
    cancellable(Text::new(message).prompt())
}

pub fn text_with_help(message: &str, help: &str) -> Result<Option<String>> {
    cancellable(Text::new(message).with_help_message(help).prompt())
}

pub fn select<T: Display>(message: &str, options: Vec<T>) -> Result<Option<T>> {
    cancellable(Select::new(message, options).prompt())
}

pub fn confirm(message: &str, default: bool) -> Result<Option<bool>> {
    cancellable(Confirm::new(message).with_default(default).prompt())
}

pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

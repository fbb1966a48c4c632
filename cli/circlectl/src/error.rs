//! Error handling and display for the CLI.

use circle_client::{ClientError, ErrorKind};
use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The failure was already written to stdout as a JSON envelope.
    #[error("request failed")]
    Reported,

    #[error("Invalid hex in --{flag}: {message}")]
    InvalidHex { flag: &'static str, message: String },

    #[error("Provide either --text or --file")]
    MissingMessageBody,
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    if matches!(err.downcast_ref::<CliError>(), Some(CliError::Reported)) {
        return;
    }

    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let Some(client_err) = err.downcast_ref::<ClientError>() else {
        return;
    };

    let hint = match client_err.kind() {
        ErrorKind::Authentication => "Hint: Run `circle auth login` to start a new session.",
        ErrorKind::Validation => "Hint: Check the values passed on the command line.",
        ErrorKind::Transport => "Hint: Check that the node is reachable (config.json or CIRCLE_NODE_URL).",
        ErrorKind::Format => "Hint: The node returned data this client does not understand.",
        ErrorKind::Remote => {
            if let ClientError::Remote {
                error_type: Some(error_type),
                ..
            } = client_err
            {
                eprintln!("\nNode error type: {error_type}");
            }
            return;
        }
    };
    eprintln!("\n{}", hint.yellow());
}

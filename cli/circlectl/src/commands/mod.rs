//! CLI commands.

mod analysis;
mod auth;
mod cases;
mod consent;
mod documents;
mod events;
mod messages;
mod payments;
mod users;

use anyhow::Result;
use circle_client::{CircleClient, EventStream, SessionStore};
use clap::{Parser, Subcommand};

use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::OutputFormat;

/// circle - Work on shared legal cases from the command line.
#[derive(Debug, Parser)]
#[command(name = "circle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage the login session.
    Auth(auth::AuthCommand),

    /// Open, list and staff cases.
    Cases(cases::CasesCommand),

    /// Send, read and watch case messages.
    Messages(messages::MessagesCommand),

    /// Upload documents and manage vault access.
    Documents(documents::DocumentsCommand),

    /// Manage contact details and who may see them.
    Users(users::UsersCommand),

    /// Start and settle document payments.
    Payments(payments::PaymentsCommand),

    /// Withdraw a lawyer's access to your documents.
    Consent(consent::ConsentCommand),

    /// Ask an analysis canister to review a document.
    Analysis(analysis::AnalysisCommand),

    /// Follow events from the node.
    Events(events::EventsCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let sessions = match config::load_session()? {
            Some(session) => SessionStore::with_session(session),
            None => SessionStore::new(),
        };

        let ctx = CommandContext {
            config,
            sessions,
            format: self.format,
        };

        match self.command {
            Commands::Auth(cmd) => cmd.run(ctx).await,
            Commands::Cases(cmd) => cmd.run(ctx).await,
            Commands::Messages(cmd) => cmd.run(ctx).await,
            Commands::Documents(cmd) => cmd.run(ctx).await,
            Commands::Users(cmd) => cmd.run(ctx).await,
            Commands::Payments(cmd) => cmd.run(ctx).await,
            Commands::Consent(cmd) => cmd.run(ctx).await,
            Commands::Analysis(cmd) => cmd.run(ctx).await,
            Commands::Events(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("circle {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub sessions: SessionStore,
    pub format: OutputFormat,
}

impl CommandContext {
    /// A client bound to the saved session.
    pub fn client(&self) -> Result<CircleClient> {
        Ok(CircleClient::new(
            self.config.client_config(),
            self.sessions.clone(),
        )?)
    }

    /// A disconnected event stream bound to the saved session.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.config.client_config(), self.sessions.clone())
    }
}

/// Decode a hex command-line value.
pub(crate) fn parse_hex(flag: &'static str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| {
        CliError::InvalidHex {
            flag,
            message: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["circle", "cases", "list", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.log_json());
    }

    #[test]
    fn parse_hex_rejects_garbage() {
        assert_eq!(parse_hex("iv", "0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert!(parse_hex("iv", "zz").is_err());
    }
}

//! Message commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use circle_client::types::{EncryptedMessage, MessageMode};
use circle_client::views::{messages_view, MessagesView};
use circle_client::{CircleClient, DomainEvent};
use circle_id::CaseId;
use circle_reconcile::{EventOutcome, FetchOutcome};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::Tabled;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CliError;
use crate::output::{display_list, emit, emit_receipt, print_info, print_json, print_table, OutputFormat};

use super::{parse_hex, CommandContext};

/// Message commands.
#[derive(Debug, Args)]
pub struct MessagesCommand {
    #[command(subcommand)]
    command: MessagesSubcommand,
}

#[derive(Debug, Subcommand)]
enum MessagesSubcommand {
    /// List every message of a case.
    List(CaseArg),

    /// List messages you can still read.
    Visible(CaseArg),

    /// Send an encrypted message to all case participants.
    Send(SendArgs),

    /// Mark a message as read.
    Read(ReadArgs),

    /// Show the case messages and keep them current until Ctrl+C.
    Watch(CaseArg),
}

#[derive(Debug, Args)]
struct CaseArg {
    case_id: CaseId,
}

#[derive(Debug, Args)]
struct SendArgs {
    case_id: CaseId,

    /// Ciphertext as hex.
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    /// File holding the raw ciphertext.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Initialization vector as hex.
    #[arg(long)]
    iv: String,

    /// Remove the message for each reader once they mark it read.
    #[arg(long)]
    vanish: bool,
}

#[derive(Debug, Args)]
struct ReadArgs {
    case_id: CaseId,

    /// Position of the message in the case history.
    index: usize,
}

#[derive(Debug, Tabled)]
struct MessageRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Sender")]
    sender: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Bytes")]
    bytes: usize,
    #[tabled(rename = "Sent")]
    timestamp: u64,
    #[tabled(rename = "Read by")]
    read_by: String,
}

fn rows(messages: &[EncryptedMessage]) -> Vec<MessageRow> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| MessageRow {
            index,
            sender: message.sender_id.to_string(),
            mode: message.mode.to_string(),
            bytes: message.ciphertext.len(),
            timestamp: message.timestamp,
            read_by: display_list(&message.read_receipts),
        })
        .collect()
}

impl MessagesCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            MessagesSubcommand::List(args) => list(ctx, args, false).await,
            MessagesSubcommand::Visible(args) => list(ctx, args, true).await,
            MessagesSubcommand::Send(args) => send(ctx, args).await,
            MessagesSubcommand::Read(args) => read(ctx, args).await,
            MessagesSubcommand::Watch(args) => watch(ctx, args).await,
        }
    }
}

async fn list(ctx: CommandContext, args: CaseArg, visible_only: bool) -> Result<()> {
    let client = ctx.client()?;
    let result = if visible_only {
        client.get_visible_messages(&args.case_id).await
    } else {
        client.get_case_messages(&args.case_id).await
    };
    emit(ctx.format, result, |messages| print_table(&rows(&messages)))
}

async fn send(ctx: CommandContext, args: SendArgs) -> Result<()> {
    let ciphertext = match (&args.text, &args.file) {
        (Some(text), _) => parse_hex("text", text)?,
        (None, Some(path)) => std::fs::read(path)
            .with_context(|| format!("Failed to read ciphertext from {path:?}"))?,
        (None, None) => return Err(CliError::MissingMessageBody.into()),
    };
    let iv = parse_hex("iv", &args.iv)?;
    let mode = if args.vanish {
        MessageMode::Vanish
    } else {
        MessageMode::Persistent
    };

    let result = ctx
        .client()?
        .send_message(&args.case_id, &ciphertext, &iv, mode)
        .await;
    emit_receipt(ctx.format, result, &format!("{mode} message sent."))
}

async fn read(ctx: CommandContext, args: ReadArgs) -> Result<()> {
    let result = ctx
        .client()?
        .mark_message_read(&args.case_id, args.index)
        .await;
    emit_receipt(
        ctx.format,
        result,
        &format!("Message {} marked as read.", args.index),
    )
}

/// Fetch the case history into the view and print it if it changed.
async fn refresh(client: &CircleClient, view: &mut MessagesView, format: OutputFormat) -> Result<()> {
    let ticket = view.begin_fetch();
    let result = client.get_case_messages(&view.projection().case_id).await;
    if let Err(e) = &result {
        if e.is_authentication() {
            return Err(e.clone().into());
        }
    }

    match view.complete_fetch(ticket, result)? {
        FetchOutcome::Applied { changed, .. } if changed => render(view, format),
        FetchOutcome::Applied { .. } => debug!("messages unchanged"),
        FetchOutcome::Failed => warn!(state = %view.state(), "message fetch failed"),
    }
    Ok(())
}

fn render(view: &MessagesView, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "data": view.items(), "error": null })),
        OutputFormat::Table => {
            println!();
            print_table(&rows(view.items()));
        }
    }
}

async fn watch(ctx: CommandContext, args: CaseArg) -> Result<()> {
    let client = ctx.client()?;
    let mut stream = ctx.stream();
    let mut view = messages_view(args.case_id);

    let (tx, mut rx) = mpsc::unbounded_channel::<DomainEvent>();
    let _listener = stream.scoped(move |event| {
        let _ = tx.send(event.clone());
    });
    stream.connect().await?;

    refresh(&client, &mut view, ctx.format).await?;
    if ctx.format == OutputFormat::Table {
        print_info(&format!(
            "Watching {} (Ctrl+C to stop)",
            view.projection().case_id.to_string().cyan()
        ));
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                match view.on_event(&event) {
                    EventOutcome::RefetchNeeded => refresh(&client, &mut view, ctx.format).await?,
                    EventOutcome::Applied => render(&view, ctx.format),
                    EventOutcome::Buffered | EventOutcome::Ignored => {}
                }
            }
        }
    }

    stream.disconnect().await;
    Ok(())
}

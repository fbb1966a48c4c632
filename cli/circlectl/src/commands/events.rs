//! Events command (live tail of the node's event socket).

use anyhow::Result;
use circle_client::DomainEvent;
use circle_id::ContextId;
use clap::{Args, Subcommand};
use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::output::{print_info, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct EventsCommand {
    #[command(subcommand)]
    command: EventsSubcommand,
}

#[derive(Debug, Subcommand)]
enum EventsSubcommand {
    /// Print events as they arrive until Ctrl+C.
    Tail(TailArgs),
}

#[derive(Debug, Args)]
struct TailArgs {
    /// Contexts to follow (repeatable). Defaults to the session's context.
    #[arg(long = "context")]
    contexts: Vec<ContextId>,
}

impl EventsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            EventsSubcommand::Tail(args) => tail(ctx, args).await,
        }
    }
}

fn print_event(event: &DomainEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => match event.to_parts() {
            Ok((kind, data)) => {
                println!("{}", serde_json::json!({ "kind": kind.as_str(), "data": data }));
            }
            Err(e) => warn!(error = %e, "failed to encode event"),
        },
        OutputFormat::Table => {
            let scope = event
                .case_id()
                .map(ToString::to_string)
                .or_else(|| event.doc_hash().map(ToString::to_string))
                .unwrap_or_default();
            println!("{:<18} {}", event.kind().as_str().bold(), scope);
        }
    }
}

async fn tail(ctx: CommandContext, args: TailArgs) -> Result<()> {
    let mut stream = ctx.stream();
    if !args.contexts.is_empty() {
        stream.subscribe(args.contexts);
    }
    let mut events = stream.events();
    stream.connect().await?;

    if ctx.format == OutputFormat::Table {
        print_info("Following events (Ctrl+C to stop)");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event, ctx.format),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    stream.disconnect().await;
    Ok(())
}

//! Session commands.

use anyhow::Result;
use chrono::{Duration, Utc};
use circle_client::Session;
use circle_id::{ContextId, UserId};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;

use crate::config;
use crate::output::{emit, print_json, print_success, OutputFormat};

use super::CommandContext;

/// Session commands.
#[derive(Debug, Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuthSubcommand {
    /// Save a session for a node context.
    Login(LoginArgs),

    /// Forget the saved session.
    Logout,

    /// Show the saved session.
    Status,
}

#[derive(Debug, Args)]
struct LoginArgs {
    /// Context (application instance) to work in.
    #[arg(long, env = "CIRCLE_CONTEXT_ID")]
    context: ContextId,

    /// Executor public key, which is also your user id.
    #[arg(long, env = "CIRCLE_EXECUTOR")]
    executor: UserId,

    /// Access token issued by the node.
    #[arg(long, env = "CIRCLE_TOKEN", hide_env_values = true)]
    token: String,

    /// Refresh token issued with the access token.
    #[arg(long, hide_env_values = true)]
    refresh_token: Option<String>,

    /// Access token lifetime in seconds.
    #[arg(long)]
    expires_in: Option<i64>,

    /// Node base URL. Saved to config.json when given.
    #[arg(long)]
    node_url: Option<String>,

    /// Check the session with a read-only call before saving it.
    #[arg(long)]
    verify: bool,
}

#[derive(Debug, Serialize)]
struct StatusView {
    node_url: String,
    context_id: ContextId,
    executor: Option<UserId>,
    expires_at: Option<chrono::DateTime<Utc>>,
    expired: bool,
}

impl AuthCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            AuthSubcommand::Login(args) => login(ctx, args).await,
            AuthSubcommand::Logout => logout(ctx),
            AuthSubcommand::Status => status(ctx),
        }
    }
}

async fn login(mut ctx: CommandContext, args: LoginArgs) -> Result<()> {
    if let Some(url) = args.node_url {
        ctx.config.node_url = url;
        ctx.config.save()?;
    }

    let mut session = Session::new(
        ctx.config.node_url.clone(),
        args.context,
        args.executor,
        args.token,
    );
    if let Some(refresh) = args.refresh_token {
        session = session.with_refresh_token(refresh);
    }
    if let Some(secs) = args.expires_in {
        session = session.with_expires_at(Utc::now() + Duration::seconds(secs));
    }

    ctx.sessions.login(session.clone());

    if args.verify {
        let client = ctx.client()?;
        let result = client.list_cases().await.map(|cases| cases.len());
        if result.is_err() {
            ctx.sessions.logout();
        }
        emit(ctx.format, result, |count| {
            print_success(&format!("Session verified ({count} visible cases)."));
        })?;
    }

    config::save_session(&session)?;

    if ctx.format == OutputFormat::Table {
        print_success(&format!(
            "Logged in to {} as {}.",
            session.context_id,
            session.executor()?
        ));
    }
    Ok(())
}

fn logout(ctx: CommandContext) -> Result<()> {
    ctx.sessions.logout();
    let removed = config::delete_session()?;

    match ctx.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "logged_out": removed })),
        OutputFormat::Table if removed => print_success("Logged out."),
        OutputFormat::Table => println!("{}", "No saved session.".dimmed()),
    }
    Ok(())
}

fn status(ctx: CommandContext) -> Result<()> {
    let Some(session) = ctx.sessions.current() else {
        match ctx.format {
            OutputFormat::Json => print_json(&serde_json::Value::Null),
            OutputFormat::Table => {
                println!("{} Not logged in", "Status:".red().bold());
                println!("\nRun {} to start a session.", "circle auth login".cyan());
            }
        }
        return Ok(());
    };

    let view = StatusView {
        expired: session.is_expired_at(Utc::now()),
        node_url: session.node_url,
        context_id: session.context_id,
        executor: session.executor_public_key,
        expires_at: session.expires_at,
    };

    match ctx.format {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Table => {
            println!("{} Logged in", "Status:".green().bold());
            println!("  Node: {}", view.node_url);
            println!("  Context: {}", view.context_id);
            if let Some(executor) = &view.executor {
                println!("  Executor: {executor}");
            }
            if view.expired {
                println!(
                    "  {} Token has expired. Run `circle auth login`.",
                    "Warning:".yellow()
                );
            } else if let Some(expires_at) = view.expires_at {
                println!("  Expires: {expires_at}");
            }
        }
    }
    Ok(())
}

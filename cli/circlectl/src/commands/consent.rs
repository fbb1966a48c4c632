//! Consent commands.

use anyhow::Result;
use circle_id::UserId;
use clap::{Args, Subcommand};

use crate::output::emit_receipt;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ConsentCommand {
    #[command(subcommand)]
    command: ConsentSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConsentSubcommand {
    /// Remove a lawyer from the access list of every document you own.
    Revoke(RevokeArgs),
}

#[derive(Debug, Args)]
struct RevokeArgs {
    lawyer: UserId,
}

impl ConsentCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ConsentSubcommand::Revoke(args) => {
                let result = ctx.client()?.revoke_consent(&args.lawyer).await;
                emit_receipt(
                    ctx.format,
                    result,
                    &format!("Revoked {}'s access to your documents.", args.lawyer),
                )
            }
        }
    }
}

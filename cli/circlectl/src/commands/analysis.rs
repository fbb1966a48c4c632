//! Analysis commands.

use anyhow::Result;
use circle_id::{CanisterId, DocHash};
use clap::{Args, Subcommand};

use crate::output::emit_receipt;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct AnalysisCommand {
    #[command(subcommand)]
    command: AnalysisSubcommand,
}

#[derive(Debug, Subcommand)]
enum AnalysisSubcommand {
    /// Request analysis of a stored document.
    Request(RequestArgs),
}

#[derive(Debug, Args)]
struct RequestArgs {
    doc_hash: DocHash,

    /// Canister that performs the analysis.
    #[arg(long)]
    canister: CanisterId,
}

impl AnalysisCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            AnalysisSubcommand::Request(args) => {
                let result = ctx
                    .client()?
                    .request_ai_analysis(&args.doc_hash, &args.canister)
                    .await;
                emit_receipt(
                    ctx.format,
                    result,
                    &format!("Analysis of {} requested.", args.doc_hash),
                )
            }
        }
    }
}

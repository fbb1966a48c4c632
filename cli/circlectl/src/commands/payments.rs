//! Payment commands.

use anyhow::Result;
use chrono::Utc;
use circle_client::types::{PaymentStatus, PAYMENT_COMPLETED};
use circle_id::{DocHash, PaymentId};
use clap::{Args, Subcommand};

use crate::output::{emit, emit_receipt, print_success};

use super::CommandContext;

/// Payment commands.
#[derive(Debug, Args)]
pub struct PaymentsCommand {
    #[command(subcommand)]
    command: PaymentsSubcommand,
}

#[derive(Debug, Subcommand)]
enum PaymentsSubcommand {
    /// Start a payment for a document.
    Process(ProcessArgs),

    /// Record the outcome of a payment.
    UpdateStatus(UpdateStatusArgs),
}

#[derive(Debug, Args)]
struct ProcessArgs {
    doc_hash: DocHash,

    /// Amount in the smallest currency unit.
    amount: u64,
}

#[derive(Debug, Args)]
struct UpdateStatusArgs {
    payment_id: PaymentId,

    /// New status, for example `completed` or `failed`.
    #[arg(long, default_value = PAYMENT_COMPLETED)]
    status: String,

    #[arg(long)]
    amount: u64,
}

impl PaymentsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            PaymentsSubcommand::Process(args) => process(ctx, args).await,
            PaymentsSubcommand::UpdateStatus(args) => update_status(ctx, args).await,
        }
    }
}

async fn process(ctx: CommandContext, args: ProcessArgs) -> Result<()> {
    let result = ctx
        .client()?
        .process_payment(&args.doc_hash, args.amount)
        .await;
    emit(ctx.format, result, |payment_id| {
        print_success(&format!("Payment {payment_id} started."));
    })
}

async fn update_status(ctx: CommandContext, args: UpdateStatusArgs) -> Result<()> {
    let status = PaymentStatus {
        payment_id: args.payment_id.clone(),
        amount: args.amount,
        status: args.status,
        timestamp: u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default(),
    };
    let result = ctx
        .client()?
        .update_payment_status(&args.payment_id, &status)
        .await;
    emit_receipt(
        ctx.format,
        result,
        &format!("Payment {} is now {}.", args.payment_id, status.status),
    )
}

//! Contact detail commands.

use anyhow::Result;
use circle_client::UserDetails;
use circle_id::UserId;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::output::{emit, emit_receipt, display_list};

use super::CommandContext;

/// Contact detail commands.
#[derive(Debug, Args)]
pub struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Debug, Subcommand)]
enum UsersSubcommand {
    /// Publish your contact details.
    Update(UpdateArgs),

    /// Show a user's contact details.
    Show(UserArg),

    /// Let a user see your contact details.
    GrantAccess(UserArg),

    /// Ask a user for access to their contact details.
    RequestAccess(UserArg),
}

#[derive(Debug, Args)]
struct UpdateArgs {
    /// Full name (letters and spaces).
    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    /// Phone as `+<country code> <10 digits>`.
    #[arg(long)]
    phone: String,

    /// Wallet address.
    #[arg(long)]
    wallet: String,
}

#[derive(Debug, Args)]
struct UserArg {
    user: UserId,
}

impl UsersCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            UsersSubcommand::Update(args) => update(ctx, args).await,
            UsersSubcommand::Show(args) => show(ctx, args).await,
            UsersSubcommand::GrantAccess(args) => grant_access(ctx, args).await,
            UsersSubcommand::RequestAccess(args) => request_access(ctx, args).await,
        }
    }
}

async fn update(ctx: CommandContext, args: UpdateArgs) -> Result<()> {
    let me = ctx.sessions.require()?.executor()?.clone();
    let details = UserDetails::new(me, args.name, args.email, args.phone, args.wallet);
    let result = ctx.client()?.update_user_details(&details).await;
    emit_receipt(ctx.format, result, "Contact details updated.")
}

async fn show(ctx: CommandContext, args: UserArg) -> Result<()> {
    let result = ctx.client()?.get_user_details(&args.user).await;
    emit(ctx.format, result, |details| {
        println!("{}", details.name.bold());
        println!("  User: {}", details.user_id);
        println!("  Email: {}", details.email);
        println!("  Phone: {}", details.phone);
        println!("  Wallet: {}", details.wallet_address);
        println!("  Shared with: {}", display_list(&details.access_list));
    })
}

async fn grant_access(ctx: CommandContext, args: UserArg) -> Result<()> {
    let result = ctx.client()?.grant_user_details_access(&args.user).await;
    emit_receipt(
        ctx.format,
        result,
        &format!("{} can now see your contact details.", args.user),
    )
}

async fn request_access(ctx: CommandContext, args: UserArg) -> Result<()> {
    let result = ctx.client()?.request_user_details_access(&args.user).await;
    emit_receipt(
        ctx.format,
        result,
        &format!("Asked {} for their contact details.", args.user),
    )
}

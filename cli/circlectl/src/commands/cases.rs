//! Case commands.

use anyhow::Result;
use circle_client::types::{CaseCreateParams, CaseMember, LegalCase, MemberRole, PrivacyLevel};
use circle_id::{CaseId, DocHash, UserId};
use clap::{Args, Subcommand};
use tabled::Tabled;

use crate::output::{display_list, display_option, emit, emit_receipt, print_table};

use super::CommandContext;

/// Case commands.
#[derive(Debug, Args)]
pub struct CasesCommand {
    #[command(subcommand)]
    command: CasesSubcommand,
}

#[derive(Debug, Subcommand)]
enum CasesSubcommand {
    /// List cases visible to you.
    List,

    /// Open a case with yourself as admin and first lawyer.
    Open(OpenArgs),

    /// List the members of a case.
    Members(CaseArg),

    /// Add a lawyer or the client to a case.
    AddMember(AddMemberArgs),
}

#[derive(Debug, Args)]
struct OpenArgs {
    /// Case name; becomes part of the case id.
    name: String,

    #[arg(long)]
    description: String,

    /// Make the case visible to every user.
    #[arg(long)]
    public: bool,

    /// Client to attach at creation.
    #[arg(long)]
    client: Option<UserId>,

    /// Hash of a document to relate to the case (repeatable).
    #[arg(long = "doc")]
    docs: Vec<DocHash>,
}

#[derive(Debug, Args)]
struct CaseArg {
    case_id: CaseId,
}

#[derive(Debug, Args)]
struct AddMemberArgs {
    case_id: CaseId,

    member: UserId,

    /// `lawyer` or `client`.
    #[arg(long, default_value = "lawyer")]
    role: MemberRole,
}

#[derive(Debug, Tabled)]
struct CaseRow {
    #[tabled(rename = "Case ID")]
    case_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Admin")]
    admin: String,
    #[tabled(rename = "Client")]
    client: String,
    #[tabled(rename = "Lawyers")]
    lawyers: String,
    #[tabled(rename = "Privacy")]
    privacy: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&LegalCase> for CaseRow {
    fn from(case: &LegalCase) -> Self {
        Self {
            case_id: case.case_id.to_string(),
            name: case.case_name.clone(),
            admin: case.admin_id.to_string(),
            client: display_option(&case.client_id),
            lawyers: display_list(&case.lawyer_ids),
            privacy: case.privacy_level.to_string(),
            status: case.status.clone(),
        }
    }
}

#[derive(Debug, Tabled)]
struct MemberRow {
    #[tabled(rename = "Member")]
    member: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Admin")]
    admin: String,
}

impl From<&CaseMember> for MemberRow {
    fn from(member: &CaseMember) -> Self {
        Self {
            member: member.member_id.to_string(),
            role: member.role.to_string(),
            admin: if member.is_admin { "yes" } else { "" }.to_string(),
        }
    }
}

impl CasesCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            CasesSubcommand::List => list(ctx).await,
            CasesSubcommand::Open(args) => open(ctx, args).await,
            CasesSubcommand::Members(args) => members(ctx, args).await,
            CasesSubcommand::AddMember(args) => add_member(ctx, args).await,
        }
    }
}

async fn list(ctx: CommandContext) -> Result<()> {
    let result = ctx.client()?.list_cases().await;
    emit(ctx.format, result, |cases| {
        let rows: Vec<CaseRow> = cases.iter().map(CaseRow::from).collect();
        print_table(&rows);
    })
}

async fn open(ctx: CommandContext, args: OpenArgs) -> Result<()> {
    let privacy = if args.public {
        PrivacyLevel::Public
    } else {
        PrivacyLevel::Private
    };
    let mut params = CaseCreateParams::new(args.name, args.description).with_privacy(privacy);
    if let Some(client) = args.client {
        params = params.with_client(client);
    }
    params.initial_docs = args.docs;

    let result = ctx.client()?.open_case(params).await;
    emit_receipt(ctx.format, result, "Case opened.")
}

async fn members(ctx: CommandContext, args: CaseArg) -> Result<()> {
    let result = ctx.client()?.list_case_members(&args.case_id).await;
    emit(ctx.format, result, |members| {
        let rows: Vec<MemberRow> = members.iter().map(MemberRow::from).collect();
        print_table(&rows);
    })
}

async fn add_member(ctx: CommandContext, args: AddMemberArgs) -> Result<()> {
    let result = ctx
        .client()?
        .add_case_member(&args.case_id, &args.member, args.role)
        .await;
    emit_receipt(
        ctx.format,
        result,
        &format!("Added {} as {}.", args.member, args.role),
    )
}

//! Document commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use circle_client::types::{DocumentUpload, LegalDocument};
use circle_id::{CaseId, DocHash, UserId};
use clap::{Args, Subcommand};
use tabled::Tabled;

use crate::output::{display_list, display_option, emit, emit_receipt, print_table};

use super::CommandContext;

/// Document commands.
#[derive(Debug, Args)]
pub struct DocumentsCommand {
    #[command(subcommand)]
    command: DocumentsSubcommand,
}

#[derive(Debug, Subcommand)]
enum DocumentsSubcommand {
    /// Upload an encrypted document to a case; participants get access.
    Upload(UploadArgs),

    /// Store an encrypted document in your private vault.
    Store(StoreArgs),

    /// Give a user access to one of your documents.
    Grant(GrantArgs),

    /// List documents you own or were granted.
    List,

    /// List the documents of a case.
    Case(CaseArg),
}

#[derive(Debug, Args)]
struct UploadArgs {
    case_id: CaseId,

    /// File holding the already encrypted content.
    file: PathBuf,

    /// Document type, for example `contract`.
    #[arg(long = "type")]
    document_type: String,
}

#[derive(Debug, Args)]
struct StoreArgs {
    file: PathBuf,

    #[arg(long = "type")]
    document_type: String,
}

#[derive(Debug, Args)]
struct GrantArgs {
    doc_hash: DocHash,

    grantee: UserId,
}

#[derive(Debug, Args)]
struct CaseArg {
    case_id: CaseId,
}

#[derive(Debug, Tabled)]
struct DocumentRow {
    #[tabled(rename = "Hash")]
    hash: String,
    #[tabled(rename = "Type")]
    document_type: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Case")]
    case_id: String,
    #[tabled(rename = "Access")]
    access: String,
    #[tabled(rename = "Analysis")]
    analysis: String,
    #[tabled(rename = "Payment")]
    payment: String,
}

impl From<&LegalDocument> for DocumentRow {
    fn from(doc: &LegalDocument) -> Self {
        Self {
            hash: doc.document_hash.to_string(),
            document_type: doc.document_type.clone(),
            owner: doc.owner_id.to_string(),
            case_id: display_option(&doc.case_id),
            access: display_list(&doc.access_list),
            analysis: display_option(&doc.ai_analysis_id),
            payment: display_option(&doc.payment_id),
        }
    }
}

fn load_upload(path: &Path, document_type: String) -> Result<DocumentUpload> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read document {path:?}"))?;
    Ok(DocumentUpload::from_content(content, document_type)?)
}

fn print_documents(documents: Vec<LegalDocument>) {
    let rows: Vec<DocumentRow> = documents.iter().map(DocumentRow::from).collect();
    print_table(&rows);
}

impl DocumentsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            DocumentsSubcommand::Upload(args) => upload(ctx, args).await,
            DocumentsSubcommand::Store(args) => store(ctx, args).await,
            DocumentsSubcommand::Grant(args) => grant(ctx, args).await,
            DocumentsSubcommand::List => list(ctx).await,
            DocumentsSubcommand::Case(args) => case(ctx, args).await,
        }
    }
}

async fn upload(ctx: CommandContext, args: UploadArgs) -> Result<()> {
    let upload = load_upload(&args.file, args.document_type)?;
    let result = ctx
        .client()?
        .upload_document_case(&upload, &args.case_id)
        .await;
    emit_receipt(
        ctx.format,
        result,
        &format!("Uploaded {} to {}.", upload.doc_hash, args.case_id),
    )
}

async fn store(ctx: CommandContext, args: StoreArgs) -> Result<()> {
    let upload = load_upload(&args.file, args.document_type)?;
    let result = ctx.client()?.store_document(&upload).await;
    emit_receipt(ctx.format, result, &format!("Stored {}.", upload.doc_hash))
}

async fn grant(ctx: CommandContext, args: GrantArgs) -> Result<()> {
    let result = ctx
        .client()?
        .grant_access(&args.doc_hash, &args.grantee)
        .await;
    emit_receipt(
        ctx.format,
        result,
        &format!("{} can now read {}.", args.grantee, args.doc_hash),
    )
}

async fn list(ctx: CommandContext) -> Result<()> {
    let result = ctx.client()?.get_accessible_documents().await;
    emit(ctx.format, result, print_documents)
}

async fn case(ctx: CommandContext, args: CaseArg) -> Result<()> {
    let result = ctx.client()?.get_group_documents(&args.case_id).await;
    emit(ctx.format, result, print_documents)
}

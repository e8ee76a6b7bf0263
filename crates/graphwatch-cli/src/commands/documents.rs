//! `graphwatch list`, `get`, `download` and `call` command implementations.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;
use graphwatch::Context;
use sharepoint::{
    DocumentInput, DocumentOperation, ListDocumentsInput, ListOptions, documents, execute,
};

use crate::credentials::{CredentialArgs, load_credentials, with_sharepoint_credential};

/// Which site the command talks to.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Credential section to authenticate with.
    #[arg(long, default_value = "sharepoint")]
    pub credential: String,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

impl SourceArgs {
    fn context(&self, operation: &str) -> Result<Context> {
        let credentials = load_credentials(&self.credentials)?;
        let ctx = Context::with_metadata(operation, "cli");
        with_sharepoint_credential(ctx, &credentials, &self.credential)
    }
}

/// Arguments for the `list` command.
#[derive(Args)]
pub struct ListArgs {
    /// Folder in the document library.
    #[arg(default_value = "/")]
    pub path: String,

    /// OData filter expression.
    #[arg(long)]
    pub filter: Option<String>,

    /// Comma-separated fields to return.
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Maximum number of documents (1-1000, default 100).
    #[arg(long)]
    pub top: Option<u32>,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Arguments for the `get` command.
#[derive(Args)]
pub struct GetArgs {
    /// Document (drive item) ID.
    pub document_id: String,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Arguments for the `download` command.
#[derive(Args)]
pub struct DownloadArgs {
    /// Document (drive item) ID.
    pub document_id: String,

    /// File to write. Defaults to the document's name in the current
    /// directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Arguments for the `call` command.
#[derive(Args)]
pub struct CallArgs {
    /// Operation JSON (inline or @file.json): one operation or an array.
    pub input: String,

    /// Record failed operations as error items instead of stopping.
    #[arg(long)]
    pub continue_on_fail: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

pub async fn list(args: &ListArgs) -> Result<()> {
    let ctx = args.source.context("list")?;
    let input = ListDocumentsInput {
        library_path: args.path.clone(),
        options: ListOptions {
            filter: args.filter.clone(),
            select: (!args.select.is_empty()).then(|| args.select.clone()),
            top: args.top,
        },
    };

    let output = documents::list_documents(&ctx, input).await?;

    println!(
        "{} ({})",
        style("Documents").bold().underlined(),
        output.library_path
    );
    println!();
    for doc in &output.documents {
        println!(
            "  {} {}",
            style(&doc.name).cyan(),
            style(format!(
                "{} · {} · {}",
                doc.size.map_or_else(|| "-".to_string(), |s| format!("{s} B")),
                doc.last_modified.to_rfc3339(),
                doc.id
            ))
            .dim()
        );
    }
    println!();
    println!("Total: {} document(s)", output.total_count);

    Ok(())
}

pub async fn get(args: &GetArgs) -> Result<()> {
    let ctx = args.source.context("get")?;
    let output = documents::get_document(
        &ctx,
        DocumentInput {
            document_id: args.document_id.clone(),
        },
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&output.document)?);
    Ok(())
}

pub async fn download(args: &DownloadArgs) -> Result<()> {
    let ctx = args.source.context("download")?;
    let output = documents::download_document(
        &ctx,
        DocumentInput {
            document_id: args.document_id.clone(),
        },
    )
    .await?;

    let bytes = output
        .content
        .decode()
        .context("downloaded content is not valid base64")?;
    let target = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&output.file_name));
    tokio::fs::write(&target, &bytes)
        .await
        .with_context(|| format!("failed to write {}", target.display()))?;

    println!(
        "{} Saved {} ({} bytes) to {}",
        style("✓").green().bold(),
        output.file_name,
        bytes.len(),
        target.display()
    );
    Ok(())
}

pub async fn call(args: &CallArgs) -> Result<()> {
    let operations = parse_operations(&read_input(&args.input)?)?;
    println!(
        "{} Running {} operation(s)",
        style("→").cyan(),
        operations.len()
    );

    let ctx = args
        .source
        .context("call")?
        .with_continue_on_fail(args.continue_on_fail);
    let items = execute(&ctx, operations).await?;

    println!("{} Result:", style("✓").green().bold());
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if let Some(path) = input.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("failed to read input file: {path}"))
    } else {
        Ok(input.to_string())
    }
}

fn parse_operations(json: &str) -> Result<Vec<DocumentOperation>> {
    let value: serde_json::Value = serde_json::from_str(json).context("invalid input JSON")?;
    let operations = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|op| vec![op])
    };
    operations.context("input is not a valid document operation")
}

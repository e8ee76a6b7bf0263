//! One-shot document operations: list a library folder, read a document's
//! metadata, download a document.

use chrono::{DateTime, Utc};
use graphwatch::{
    BinaryData, Context, ExecutionItem, JsonSchema, Result, anyhow::Context as _, schemars,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    content::{fetch_content, get_document as fetch_document},
    listing::{ListOptions, list_files},
    session::GraphSession,
    types::{DocumentDetails, FileRecord},
};

/// Number of documents listed when the caller does not set `top`.
pub const DEFAULT_DOCUMENT_TOP: u32 = 100;

/// Input for [`list_documents`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsInput {
    /// Folder in the document library; `/` is the library root.
    #[serde(default = "default_library_path")]
    pub library_path: String,
    /// Query refinements. `top` defaults to 100.
    #[serde(default)]
    pub options: ListOptions,
}

fn default_library_path() -> String {
    "/".to_string()
}

/// Output from [`list_documents`].
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsOutput {
    pub site_id: String,
    pub drive_id: String,
    pub library_path: String,
    pub documents: Vec<FileRecord>,
    pub total_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Input for [`get_document`] and [`download_document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    /// Drive item id of the document.
    pub document_id: String,
}

/// Output from [`get_document`].
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentOutput {
    pub site_id: String,
    pub drive_id: String,
    pub document_id: String,
    pub document: DocumentDetails,
    pub timestamp: DateTime<Utc>,
}

/// Output from [`download_document`]. The content travels as the item's
/// binary payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDocumentOutput {
    pub site_id: String,
    pub drive_id: String,
    pub document_id: String,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub content: BinaryData,
}

/// One requested operation; a batch is a list of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum DocumentOperation {
    ListDocuments(ListDocumentsInput),
    GetDocument(DocumentInput),
    DownloadDocument(DocumentInput),
}

impl DocumentOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListDocuments(_) => "listDocuments",
            Self::GetDocument(_) => "getDocument",
            Self::DownloadDocument(_) => "downloadDocument",
        }
    }
}

/// # List SharePoint Documents
///
/// Lists the files in a folder of the site's document library. Folders are
/// not included and pagination is followed until `top` documents are
/// collected.
///
/// ## Capabilities
/// - read
///
/// ## Tags
/// - file-storage
/// - sharepoint
///
/// # Errors
///
/// Returns an error if:
/// - Authentication or site resolution fails
/// - The folder path is malformed or does not exist
/// - `options.top` is outside 1-1000
pub async fn list_documents(
    ctx: &Context,
    input: ListDocumentsInput,
) -> Result<ListDocumentsOutput> {
    let options = ListOptions {
        top: input.options.top.or(Some(DEFAULT_DOCUMENT_TOP)),
        ..input.options
    };
    options.validate()?;

    let session = GraphSession::connect(ctx).await?;
    let documents = list_files(
        &session.client,
        &session.drive_id,
        &input.library_path,
        &options,
    )
    .await?;

    Ok(ListDocumentsOutput {
        site_id: session.site_id,
        drive_id: session.drive_id,
        library_path: input.library_path,
        total_count: documents.len(),
        documents,
        timestamp: Utc::now(),
    })
}

/// # Get SharePoint Document
///
/// Retrieves the metadata of one document, including who created and last
/// modified it.
///
/// ## Capabilities
/// - read
///
/// ## Tags
/// - file-storage
/// - sharepoint
///
/// # Errors
///
/// Returns an error if authentication or site resolution fails, or the
/// document does not exist or is not accessible.
pub async fn get_document(ctx: &Context, input: DocumentInput) -> Result<GetDocumentOutput> {
    let session = GraphSession::connect(ctx).await?;
    let document = fetch_document(&session.client, &session.drive_id, &input.document_id).await?;

    Ok(GetDocumentOutput {
        site_id: session.site_id,
        drive_id: session.drive_id,
        document_id: input.document_id,
        document,
        timestamp: Utc::now(),
    })
}

/// # Download SharePoint Document
///
/// Downloads a document's content together with its name and MIME type.
///
/// ## Capabilities
/// - read
///
/// ## Tags
/// - file-storage
/// - sharepoint
///
/// # Errors
///
/// Returns an error if authentication or site resolution fails, or the
/// document does not exist or is not accessible.
pub async fn download_document(
    ctx: &Context,
    input: DocumentInput,
) -> Result<DownloadDocumentOutput> {
    let session = GraphSession::connect(ctx).await?;
    let details = fetch_document(&session.client, &session.drive_id, &input.document_id).await?;
    let bytes = fetch_content(&session.client, &session.drive_id, &input.document_id).await?;
    let content = BinaryData::from_bytes(
        &bytes,
        details.file.mime_type.as_deref(),
        &details.file.name,
        details.file.size,
    );

    Ok(DownloadDocumentOutput {
        site_id: session.site_id,
        drive_id: session.drive_id,
        document_id: input.document_id,
        file_name: details.file.name,
        timestamp: Utc::now(),
        content,
    })
}

/// Runs a batch of operations, producing one item per operation paired with
/// its input index.
///
/// # Errors
///
/// With continue-on-fail disabled, the first failing operation aborts the
/// batch with `SharePoint operation failed for item <index>: <cause>`. With
/// it enabled, the failure is recorded as an `{error, operation, timestamp}`
/// item and the batch continues.
pub async fn execute(
    ctx: &Context,
    operations: Vec<DocumentOperation>,
) -> Result<Vec<ExecutionItem>> {
    let mut items = Vec::with_capacity(operations.len());
    for (index, operation) in operations.into_iter().enumerate() {
        let name = operation.name();
        let item = match run(ctx, operation).await {
            Ok(item) => item,
            Err(error) => {
                let mut item = ctx
                    .recover(error)
                    .with_context(|| format!("SharePoint operation failed for item {index}"))?;
                item.insert("operation", json!(name));
                item
            }
        };
        items.push(item.paired_with(index));
    }
    Ok(items)
}

async fn run(ctx: &Context, operation: DocumentOperation) -> Result<ExecutionItem> {
    let name = operation.name();
    let mut item = match operation {
        DocumentOperation::ListDocuments(input) => {
            ExecutionItem::new(serde_json::to_value(list_documents(ctx, input).await?)?)
        }
        DocumentOperation::GetDocument(input) => {
            ExecutionItem::new(serde_json::to_value(get_document(ctx, input).await?)?)
        }
        DocumentOperation::DownloadDocument(input) => {
            let output = download_document(ctx, input).await?;
            ExecutionItem::new(serde_json::to_value(&output)?).with_binary(output.content)
        }
    };
    item.insert("operation", json!(name));
    Ok(item)
}

//! Folder listings with pagination.

use graphwatch::{JsonSchema, schemars};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::SharePointError,
    graph::GraphClient,
    path::FolderPath,
    types::{DriveItem, FileRecord, GraphPage},
};

/// Fields requested for every listing unless the caller overrides `select`.
pub const DEFAULT_SELECT: &[&str] = &[
    "id",
    "name",
    "lastModifiedDateTime",
    "size",
    "file",
    "folder",
    "webUrl",
    "@microsoft.graph.downloadUrl",
];

/// Fields a listing cannot be turned into records without. They are added
/// to a caller's `select` when missing.
pub const REQUIRED_SELECT: &[&str] = &["id", "name", "file", "folder", "lastModifiedDateTime"];

/// Largest `top` a caller may request.
pub const MAX_TOP: u32 = 1000;

/// Optional query refinements for a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    /// OData `$filter` expression passed through to Graph.
    #[serde(default)]
    pub filter: Option<String>,
    /// Fields to return instead of the default set. The fields needed to
    /// build a file record are always requested.
    #[serde(default)]
    pub select: Option<Vec<String>>,
    /// Maximum number of files to return (1-1000).
    #[serde(default)]
    pub top: Option<u32>,
}

impl ListOptions {
    /// Checks that `top`, when given, is in range.
    ///
    /// # Errors
    ///
    /// Returns [`SharePointError::InvalidOption`] if `top` is 0 or above
    /// [`MAX_TOP`].
    pub fn validate(&self) -> Result<(), SharePointError> {
        match self.top {
            Some(top) if !(1..=MAX_TOP).contains(&top) => Err(SharePointError::InvalidOption(
                format!("top must be between 1 and {MAX_TOP}, got {top}"),
            )),
            _ => Ok(()),
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let select = self
            .select
            .as_deref()
            .filter(|fields| fields.iter().any(|f| !f.trim().is_empty()))
            .map_or_else(|| DEFAULT_SELECT.join(","), with_required);

        let mut query = vec![("$select", select)];
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            query.push(("$filter", filter.to_string()));
        }
        if let Some(top) = self.top {
            query.push(("$top", top.to_string()));
        }
        query
    }
}

fn with_required(fields: &[String]) -> String {
    let mut merged: Vec<&str> = Vec::with_capacity(fields.len() + REQUIRED_SELECT.len());
    let requested = fields.iter().map(String::as_str).map(str::trim);
    for field in requested.chain(REQUIRED_SELECT.iter().copied()) {
        if !field.is_empty() && !merged.iter().any(|m| m.eq_ignore_ascii_case(field)) {
            merged.push(field);
        }
    }
    merged.join(",")
}

/// Lists the files directly inside `path`, following every continuation page.
///
/// Folders and other non-file entries are dropped. With `options.top`, at most
/// that many files are returned and no further pages are fetched once the
/// limit is reached.
///
/// # Errors
///
/// Returns [`SharePointError::InvalidPath`] for a malformed path, and
/// otherwise maps HTTP failures to the folder error taxonomy
/// ([`SharePointError::FolderNotFound`], [`SharePointError::PermissionDenied`],
/// [`SharePointError::Authentication`], [`SharePointError::ListFailed`]).
pub async fn list_files(
    client: &GraphClient,
    drive_id: &str,
    path: &str,
    options: &ListOptions,
) -> Result<Vec<FileRecord>, SharePointError> {
    options.validate()?;
    let folder = FolderPath::parse(path)?;
    let limit = options
        .top
        .map(|top| usize::try_from(top).unwrap_or(usize::MAX));

    let mut files = Vec::new();
    let mut pages = Pages::new(client, drive_id, &folder, options.query());
    while let Some(items) = pages.next_page().await.map_err(|e| e.for_folder(path))? {
        files.extend(items.into_iter().filter_map(FileRecord::from_item));
        if limit.is_some_and(|limit| files.len() >= limit) {
            break;
        }
    }
    if let Some(limit) = limit {
        files.truncate(limit);
    }

    debug!(folder = %folder, count = files.len(), "listed files");
    Ok(files)
}

/// Lists the immediate subfolders of `folder`.
///
/// # Errors
///
/// Returns the folder error taxonomy on HTTP failures.
pub async fn list_folders(
    client: &GraphClient,
    drive_id: &str,
    folder: &FolderPath,
) -> Result<Vec<FolderPath>, SharePointError> {
    let (_, folders) = list_entries(client, drive_id, folder).await?;
    Ok(folders)
}

/// Lists both files and subfolders of `folder` in one pass over its
/// children.
pub(crate) async fn list_entries(
    client: &GraphClient,
    drive_id: &str,
    folder: &FolderPath,
) -> Result<(Vec<FileRecord>, Vec<FolderPath>), SharePointError> {
    let display = folder.to_string();
    let query = ListOptions::default().query();

    let mut files = Vec::new();
    let mut folders = Vec::new();
    let mut pages = Pages::new(client, drive_id, folder, query);
    while let Some(items) = pages.next_page().await.map_err(|e| e.for_folder(&display))? {
        for item in items {
            if item.folder.is_some() {
                folders.push(folder.join(&item.name));
            } else if let Some(file) = FileRecord::from_item(item) {
                files.push(file);
            }
        }
    }
    Ok((files, folders))
}

/// Walks the continuation links of a children listing.
struct Pages<'a> {
    client: &'a GraphClient,
    next: Option<NextPage<'a>>,
}

enum NextPage<'a> {
    First {
        drive_id: &'a str,
        folder: &'a FolderPath,
        query: Vec<(&'static str, String)>,
    },
    Link(String),
}

impl<'a> Pages<'a> {
    fn new(
        client: &'a GraphClient,
        drive_id: &'a str,
        folder: &'a FolderPath,
        query: Vec<(&'static str, String)>,
    ) -> Self {
        Self {
            client,
            next: Some(NextPage::First {
                drive_id,
                folder,
                query,
            }),
        }
    }

    async fn next_page(&mut self) -> Result<Option<Vec<DriveItem>>, SharePointError> {
        let page: GraphPage<DriveItem> = match self.next.take() {
            None => return Ok(None),
            Some(NextPage::First {
                drive_id,
                folder,
                query,
            }) => {
                let segments = folder.children_segments(drive_id);
                let url = self.client.url_with_segments(segments.as_slice())?;
                self.client.get_json(url, &query).await?
            }
            Some(NextPage::Link(link)) => {
                let url = reqwest::Url::parse(&link).map_err(|e| {
                    SharePointError::Decode(format!("invalid @odata.nextLink {link}: {e}"))
                })?;
                self.client.get_json(url, &[]).await?
            }
        };
        self.next = page.next_link.map(NextPage::Link);
        Ok(Some(page.value))
    }
}

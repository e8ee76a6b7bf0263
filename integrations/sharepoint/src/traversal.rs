//! Recursive listing of a folder subtree.

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::SharePointError, graph::GraphClient, listing::list_entries, path::FolderPath,
    types::FileRecord,
};

/// Default number of folder levels below the starting folder that are visited.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Files found under a folder, plus the branches that could not be read.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    pub files: Vec<FileRecord>,
    pub skipped: Vec<SkippedBranch>,
}

/// A subfolder left out of a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedBranch {
    pub path: String,
    pub reason: String,
}

/// Lists every file under `root`, descending into subfolders up to
/// `max_depth` levels.
///
/// Only a failure to read `root` itself is an error. A subfolder that fails
/// to list is logged, recorded in [`Traversal::skipped`] and contributes no
/// files.
///
/// # Errors
///
/// Returns [`SharePointError::InvalidPath`] for a malformed `root`, or the
/// folder error taxonomy if `root` cannot be listed.
pub async fn list_files_recursive(
    client: &GraphClient,
    drive_id: &str,
    root: &str,
    max_depth: usize,
) -> Result<Traversal, SharePointError> {
    let root = FolderPath::parse(root)?;
    let (files, folders) = list_entries(client, drive_id, &root).await?;

    let mut traversal = Traversal {
        files,
        skipped: Vec::new(),
    };
    let mut pending: Vec<(FolderPath, usize)> = folders.into_iter().rev().map(|f| (f, 1)).collect();

    while let Some((folder, depth)) = pending.pop() {
        if depth > max_depth {
            warn!(folder = %folder, max_depth, "maximum folder depth reached, not descending");
            traversal.skipped.push(SkippedBranch {
                path: folder.to_string(),
                reason: format!("deeper than maximum depth {max_depth}"),
            });
            continue;
        }

        match list_entries(client, drive_id, &folder).await {
            Ok((files, children)) => {
                debug!(folder = %folder, files = files.len(), subfolders = children.len(), "listed subfolder");
                traversal.files.extend(files);
                pending.extend(children.into_iter().rev().map(|f| (f, depth + 1)));
            }
            Err(e) => {
                warn!(folder = %folder, error = %e, "skipping subfolder that could not be listed");
                traversal.skipped.push(SkippedBranch {
                    path: folder.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(traversal)
}

//! Document metadata and content downloads.

use bytes::Bytes;

use crate::{
    error::SharePointError,
    graph::GraphClient,
    types::{DocumentDetails, DriveItem},
};

/// Downloads the raw content of a file in one request.
///
/// # Errors
///
/// Returns [`SharePointError::NotFound`], [`SharePointError::PermissionDenied`]
/// or [`SharePointError::Authentication`] for the matching HTTP statuses, and
/// the underlying request error otherwise.
pub async fn fetch_content(
    client: &GraphClient,
    drive_id: &str,
    file_id: &str,
) -> Result<Bytes, SharePointError> {
    let url = client.url_with_segments(&["drives", drive_id, "items", file_id, "content"])?;
    client
        .get_bytes(url)
        .await
        .map_err(|e| e.for_item(file_id))
}

/// Fetches the metadata of one document.
///
/// # Errors
///
/// Same as [`fetch_content`].
pub async fn get_document(
    client: &GraphClient,
    drive_id: &str,
    document_id: &str,
) -> Result<DocumentDetails, SharePointError> {
    let url = client.url_with_segments(&["drives", drive_id, "items", document_id])?;
    let item: DriveItem = client
        .get_json(url, &[])
        .await
        .map_err(|e| e.for_item(document_id))?;
    Ok(DocumentDetails::from(item))
}

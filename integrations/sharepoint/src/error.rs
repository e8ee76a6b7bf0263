//! Error taxonomy for SharePoint operations.

use thiserror::Error;

/// Errors raised while talking to Microsoft Graph on behalf of SharePoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SharePointError {
    /// Token acquisition failed or Graph rejected the token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The configured site URL cannot be interpreted.
    #[error("invalid SharePoint site URL format: {0}")]
    InvalidSiteUrl(String),

    /// No site matched the configured URL.
    #[error("{}", site_not_found_message(.site, .available))]
    SiteNotFound { site: String, available: Vec<String> },

    /// The site has no document libraries.
    #[error("no drives found for the site")]
    NoDrives,

    /// The folder path does not exist in the library.
    #[error("folder not found: {0}. Please verify the path exists in SharePoint")]
    FolderNotFound(String),

    /// A document or other item does not exist.
    #[error("item not found: {0}")]
    NotFound(String),

    /// The caller lacks access to the target.
    #[error("access denied to {0}. Please check your permissions")]
    PermissionDenied(String),

    /// The folder path contains characters SharePoint does not allow.
    #[error("invalid characters in folder path: {0}")]
    InvalidPath(String),

    /// An option value is out of range.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// Listing a folder failed for a reason other than the ones above.
    #[error("failed to access folder {path}: {message}")]
    ListFailed { path: String, message: String },

    /// Graph answered with an unexpected status.
    #[error("Microsoft Graph request failed ({status}): {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("failed to send request to Microsoft Graph: {0}")]
    Transport(#[from] reqwest::Error),

    /// Graph answered with a body we could not parse.
    #[error("unexpected response from Microsoft Graph: {0}")]
    Decode(String),
}

fn site_not_found_message(site: &str, available: &[String]) -> String {
    if available.is_empty() {
        format!("no sites found matching '{site}'")
    } else {
        format!(
            "site '{site}' not found. Available sites: {}",
            available.join(", ")
        )
    }
}

impl SharePointError {
    /// Reinterprets an HTTP failure that happened while reading `path`.
    pub(crate) fn for_folder(self, path: &str) -> Self {
        match self {
            Self::Status { status: 404, .. } => Self::FolderNotFound(path.to_string()),
            Self::Status { status: 403, .. } => Self::PermissionDenied(format!("folder {path}")),
            Self::Status {
                status: 401,
                message,
            } => Self::Authentication(message),
            Self::Status { .. } | Self::Transport(_) | Self::Decode(_) => Self::ListFailed {
                path: path.to_string(),
                message: self.to_string(),
            },
            other => other,
        }
    }

    /// Reinterprets an HTTP failure that happened while reading an item.
    pub(crate) fn for_item(self, item_id: &str) -> Self {
        match self {
            Self::Status { status: 404, .. } => Self::NotFound(item_id.to_string()),
            Self::Status { status: 403, .. } => Self::PermissionDenied(format!("item {item_id}")),
            Self::Status {
                status: 401,
                message,
            } => Self::Authentication(message),
            other => other,
        }
    }
}

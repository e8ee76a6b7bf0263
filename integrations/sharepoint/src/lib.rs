//! Microsoft SharePoint integration for Graphwatch.
//!
//! This integration watches SharePoint document libraries through Microsoft
//! Graph and provides one-shot document operations:
//! - Poll a folder for added and modified documents ([`trigger::poll`])
//! - List documents in a library folder
//! - Get document metadata
//! - Download documents
//!
//! Authentication uses the OAuth2 client-credentials grant of an Azure AD app
//! registration with `Sites.Read.All` or `Files.Read.All` application
//! permission.

pub mod auth;
pub mod changes;
pub mod content;
pub mod documents;
mod error;
pub mod graph;
pub mod listing;
pub mod path;
pub mod session;
pub mod site;
#[cfg(test)]
mod testing;
pub mod traversal;
pub mod trigger;
mod types;

use graphwatch::define_credential;

pub use changes::{PollScope, PollSnapshot, TriggerEvent};
pub use documents::{DocumentInput, DocumentOperation, ListDocumentsInput, execute};
pub use error::SharePointError;
pub use listing::ListOptions;
pub use path::FolderPath;
pub use session::GraphSession;
pub use trigger::{TRIGGER_NAME, TriggerOptions, poll};
pub use types::{DocumentDetails, FileRecord};

define_credential! {
    /// Azure AD app registration used to read a SharePoint site.
    SharePointCredential("sharepoint") {
        /// Azure AD tenant (directory) ID
        tenant_id: String,
        /// Application (client) ID of the app registration
        client_id: String,
        /// Client secret of the app registration
        client_secret: String,
        /// Site URL, e.g. https://contoso.sharepoint.com/sites/Marketing
        site_url: String,
        /// Token endpoint override; defaults to the tenant's Azure AD endpoint
        token_endpoint: Option<String>,
        /// Microsoft Graph endpoint override; defaults to https://graph.microsoft.com/v1.0
        endpoint: Option<String>,
    }
}

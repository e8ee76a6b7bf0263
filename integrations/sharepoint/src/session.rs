//! Per-invocation connection to a SharePoint site.

use graphwatch::{Context, Result, anyhow::Context as _, debug, ensure};

use crate::{
    SharePointCredential,
    auth::{ClientCredentials, request_token},
    graph::{DEFAULT_GRAPH_ENDPOINT, GraphClient},
    site::{resolve_drive, resolve_site},
};

/// An authenticated client bound to the site and document library named by
/// the context's `sharepoint` credential.
///
/// A session is built for every poll or operation; tokens and identifiers
/// are not cached across invocations.
#[derive(Debug, Clone)]
pub struct GraphSession {
    pub client: GraphClient,
    pub site_id: String,
    pub drive_id: String,
}

impl GraphSession {
    /// Authenticates and resolves the site and drive.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The `sharepoint` credential is missing or has empty required fields
    /// - The token request fails
    /// - The site or its document library cannot be resolved
    pub async fn connect(ctx: &Context) -> Result<Self> {
        let cred = SharePointCredential::get(ctx)?;
        ensure!(!cred.tenant_id.trim().is_empty(), "tenant_id must not be empty");
        ensure!(!cred.client_id.trim().is_empty(), "client_id must not be empty");
        ensure!(
            !cred.client_secret.trim().is_empty(),
            "client_secret must not be empty"
        );
        ensure!(!cred.site_url.trim().is_empty(), "site_url must not be empty");

        let http = reqwest::Client::builder()
            .build()
            .context("failed to create HTTP client")?;

        let token = request_token(
            &http,
            ClientCredentials {
                tenant_id: cred.tenant_id.trim(),
                client_id: cred.client_id.trim(),
                client_secret: &cred.client_secret,
                token_endpoint: cred.token_endpoint.as_deref(),
            },
        )
        .await?;

        let endpoint = cred
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(DEFAULT_GRAPH_ENDPOINT);
        let client = GraphClient::new(http, endpoint, token.access_token)?;

        let site_id = resolve_site(&client, cred.site_url.trim()).await?;
        let drive_id = resolve_drive(&client, &site_id).await?;
        debug!(
            request_id = ctx.request_id(),
            site_id = %site_id,
            drive_id = %drive_id,
            "connected to SharePoint"
        );

        Ok(Self {
            client,
            site_id,
            drive_id,
        })
    }
}

//! Resolution of a site URL to Graph site and drive identifiers.

use reqwest::Url;
use tracing::{debug, info};

use crate::{
    error::SharePointError,
    graph::GraphClient,
    types::{Drive, GraphPage, Site},
};

/// Resolves a SharePoint site URL such as
/// `https://contoso.sharepoint.com/sites/Marketing` to its Graph site id.
///
/// The direct `hostname:path` lookup is tried first. If it fails for any
/// reason, the site name is taken from the segment after `sites/` and looked
/// up with a site search, preferring an exact case-insensitive name match over
/// a substring match.
///
/// # Errors
///
/// Returns [`SharePointError::InvalidSiteUrl`] if the fallback cannot find a
/// `sites/` segment, or [`SharePointError::SiteNotFound`] if no searched site
/// matches.
pub async fn resolve_site(client: &GraphClient, site_url: &str) -> Result<String, SharePointError> {
    match lookup_site_direct(client, site_url).await {
        Ok(Some(id)) => {
            debug!(site_id = %id, "resolved site by URL");
            return Ok(id);
        }
        Ok(None) => debug!("direct site lookup returned no id, falling back to search"),
        Err(e) => debug!(error = %e, "direct site lookup failed, falling back to search"),
    }

    let site_name = site_name_from_url(site_url)?;
    let url = client.url_with_segments(&["sites"])?;
    let page: GraphPage<Site> = client
        .get_json(url, &[("search", site_name.clone())])
        .await?;
    let id = select_site(&site_name, &page.value)?;
    info!(site = %site_name, site_id = %id, "resolved site by search");
    Ok(id)
}

/// Picks the document library of a site: the one named "Documents" or whose
/// web URL ends in "Shared Documents", else the first one listed.
///
/// # Errors
///
/// Returns [`SharePointError::NoDrives`] if the site has no libraries.
pub async fn resolve_drive(client: &GraphClient, site_id: &str) -> Result<String, SharePointError> {
    let url = client.url_with_segments(&["sites", site_id, "drives"])?;
    let page: GraphPage<Drive> = client.get_json(url, &[]).await?;
    select_drive(&page.value)
}

async fn lookup_site_direct(
    client: &GraphClient,
    site_url: &str,
) -> Result<Option<String>, SharePointError> {
    let parsed =
        Url::parse(site_url).map_err(|_| SharePointError::InvalidSiteUrl(site_url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| SharePointError::InvalidSiteUrl(site_url.to_string()))?;

    let mut segments = vec![String::from("sites"), format!("{host}:")];
    segments.extend(
        parsed
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::decode(s).map_or_else(|_| s.to_string(), |d| d.into_owned())),
    );

    let url = client.url_with_segments(segments.as_slice())?;
    let site: Site = client.get_json(url, &[]).await?;
    Ok(site.id)
}

fn site_name_from_url(site_url: &str) -> Result<String, SharePointError> {
    let invalid = || SharePointError::InvalidSiteUrl(site_url.to_string());
    let (_, rest) = site_url.split_once("sites/").ok_or_else(invalid)?;
    let name = rest.split('/').next().unwrap_or_default();
    if name.is_empty() {
        return Err(invalid());
    }
    Ok(urlencoding::decode(name).map_or_else(|_| name.to_string(), |d| d.into_owned()))
}

fn select_site(name: &str, sites: &[Site]) -> Result<String, SharePointError> {
    let wanted = name.to_lowercase();
    let exact = sites
        .iter()
        .find(|site| site_names(site).iter().any(|n| *n == wanted));
    let partial = || {
        sites
            .iter()
            .find(|site| site_names(site).iter().any(|n| n.contains(&wanted)))
    };

    exact
        .or_else(partial)
        .and_then(|site| site.id.clone())
        .ok_or_else(|| SharePointError::SiteNotFound {
            site: name.to_string(),
            available: sites
                .iter()
                .filter_map(|s| s.name.clone().or_else(|| s.display_name.clone()))
                .collect(),
        })
}

fn site_names(site: &Site) -> Vec<String> {
    [site.name.as_deref(), site.display_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .collect()
}

fn select_drive(drives: &[Drive]) -> Result<String, SharePointError> {
    let is_documents = |drive: &&Drive| {
        drive.name.as_deref() == Some("Documents")
            || drive.web_url.as_deref().is_some_and(|url| {
                url.contains("Shared%20Documents") || url.contains("Shared Documents")
            })
    };

    drives
        .iter()
        .find(is_documents)
        .or_else(|| drives.first())
        .map(|drive| drive.id.clone())
        .ok_or(SharePointError::NoDrives)
}

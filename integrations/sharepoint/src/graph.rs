//! Authenticated Microsoft Graph client.

use bytes::Bytes;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::SharePointError;

/// Default Microsoft Graph API endpoint.
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";

/// Graph API client for making authenticated requests to Microsoft Graph.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    /// Creates a client for `endpoint` that authenticates with `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is empty or not an absolute URL.
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        access_token: impl Into<String>,
    ) -> Result<Self, SharePointError> {
        let base_url = normalize_base_url(endpoint)?;
        Url::parse(&base_url)
            .map_err(|e| SharePointError::InvalidOption(format!("endpoint {base_url}: {e}")))?;
        Ok(Self {
            http,
            base_url,
            access_token: access_token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Constructs a URL by appending path segments to the base URL.
    ///
    /// Each segment is percent-encoded on its own, so folder names may contain
    /// spaces and other reserved characters.
    pub(crate) fn url_with_segments<S: AsRef<str>>(
        &self,
        segments: &[S],
    ) -> Result<Url, SharePointError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SharePointError::InvalidOption(format!("endpoint: {e}")))?;
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                SharePointError::InvalidOption("endpoint must be an absolute URL".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment.as_ref());
            }
        }
        Ok(url)
    }

    /// Sends a GET request and parses the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The HTTP request fails
    /// - The response status indicates an error
    /// - The response body cannot be parsed as JSON
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, SharePointError> {
        let request = self.http.get(url).query(query);
        let response = self.send_request(request).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SharePointError::Decode(e.to_string()))
    }

    /// Sends a GET request and returns the raw response body.
    pub(crate) async fn get_bytes(&self, url: Url) -> Result<Bytes, SharePointError> {
        let response = self.send_request(self.http.get(url)).await?;
        Ok(response.bytes().await?)
    }

    /// Sends an HTTP request with authentication and headers.
    async fn send_request(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SharePointError> {
        let response = request
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "graph response");
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SharePointError::Status {
                status: status.as_u16(),
                message: graph_error_message(&body),
            })
        }
    }
}

/// Pulls `error.message` out of a Graph error body, falling back to the raw
/// body.
fn graph_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Normalizes a base URL by trimming whitespace and trailing slashes.
///
/// # Errors
///
/// Returns an error if the endpoint is empty or contains only whitespace.
fn normalize_base_url(endpoint: &str) -> Result<String, SharePointError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(SharePointError::InvalidOption(
            "endpoint must not be empty".to_string(),
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

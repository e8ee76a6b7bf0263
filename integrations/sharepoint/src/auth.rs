//! OAuth2 client-credentials token acquisition.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::SharePointError;

/// Scope requested for application access to Microsoft Graph.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

const AUTHORITY: &str = "https://login.microsoftonline.com";

/// Application identity used to request a token.
#[derive(Debug, Clone, Copy)]
pub struct ClientCredentials<'a> {
    pub tenant_id: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    /// Overrides the Azure AD token endpoint, e.g. for sovereign clouds.
    pub token_endpoint: Option<&'a str>,
}

impl ClientCredentials<'_> {
    pub fn token_url(&self) -> String {
        match self.token_endpoint {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.trim().to_string(),
            _ => format!("{AUTHORITY}/{}/oauth2/v2.0/token", self.tenant_id),
        }
    }
}

/// Bearer token returned by the identity platform.
#[derive(Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<JsonValue>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Requests an app-only Graph token. Tokens are not cached; every call makes
/// a fresh request.
///
/// # Errors
///
/// Returns [`SharePointError::Authentication`] if the endpoint is unreachable,
/// rejects the credentials, or answers without an access token.
pub async fn request_token(
    http: &reqwest::Client,
    credentials: ClientCredentials<'_>,
) -> Result<AccessToken, SharePointError> {
    let url = credentials.token_url();
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", credentials.client_id),
        ("client_secret", credentials.client_secret),
        ("scope", GRAPH_SCOPE),
    ];

    let response = http
        .post(&url)
        .form(&form)
        .send()
        .await
        .map_err(|e| SharePointError::Authentication(format!("token request failed: {e}")))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();

    if !status.is_success() {
        let description = parsed.and_then(|p| p.error_description);
        let message = match (status.as_u16(), description) {
            (401, _) => {
                "invalid client credentials. Please check your client ID and client secret"
                    .to_string()
            }
            (400, Some(description)) => description,
            (400, None) => "invalid client credentials or tenant ID".to_string(),
            (code, Some(description)) => format!("token endpoint returned {code}: {description}"),
            (code, None) => format!("token endpoint returned {code}"),
        };
        return Err(SharePointError::Authentication(message));
    }

    let parsed = parsed.ok_or_else(|| {
        SharePointError::Authentication("token endpoint returned invalid JSON".to_string())
    })?;
    let access_token = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            SharePointError::Authentication("no access token received from Azure AD".to_string())
        })?;
    let expires_in = parsed.expires_in.and_then(|v| match v {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    });

    debug!(expires_in, "acquired Graph access token");
    Ok(AccessToken {
        access_token,
        expires_in,
    })
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    use super::*;

    fn credentials(endpoint: &str) -> ClientCredentials<'_> {
        ClientCredentials {
            tenant_id: "tenant-1",
            client_id: "client-1",
            client_secret: "secret-1",
            token_endpoint: Some(endpoint),
        }
    }

    #[test]
    fn test_token_url_defaults_to_tenant_authority() {
        let creds = ClientCredentials {
            tenant_id: "contoso",
            client_id: "c",
            client_secret: "s",
            token_endpoint: None,
        };

        assert_eq!(
            creds.token_url(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
    }

    #[tokio::test]
    async fn test_request_token_posts_client_credentials_form() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("client_secret=secret-1"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Fgraph.microsoft.com%2F.default",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"token_type":"Bearer","expires_in":3599,"access_token":"abc"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;
        let endpoint = format!("{}/token", server.uri());

        // Act
        let token = request_token(&reqwest::Client::new(), credentials(&endpoint))
            .await
            .unwrap();

        // Assert
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_bad_request_surfaces_error_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_raw(
                r#"{"error":"invalid_request","error_description":"AADSTS90002: Tenant not found."}"#,
                "application/json",
            ))
            .mount(&server)
            .await;
        let endpoint = format!("{}/token", server.uri());

        let err = request_token(&reqwest::Client::new(), credentials(&endpoint))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "authentication failed: AADSTS90002: Tenant not found."
        );
    }

    #[tokio::test]
    async fn test_unauthorized_reports_invalid_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let endpoint = format!("{}/token", server.uri());

        let err = request_token(&reqwest::Client::new(), credentials(&endpoint))
            .await
            .unwrap_err();

        assert!(matches!(err, SharePointError::Authentication(ref msg) if msg.contains("invalid client credentials")));
    }

    #[tokio::test]
    async fn test_success_without_access_token_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"expires_in":3599}"#, "application/json"),
            )
            .mount(&server)
            .await;
        let endpoint = format!("{}/token", server.uri());

        let err = request_token(&reqwest::Client::new(), credentials(&endpoint))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "authentication failed: no access token received from Azure AD"
        );
    }
}

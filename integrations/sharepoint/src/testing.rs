//! Shared fixtures for tests that talk to a mocked Graph endpoint.

use std::collections::HashMap;

use graphwatch::Context;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub(crate) const SITE_URL: &str = "https://contoso.sharepoint.com/sites/Marketing";

/// Context whose `sharepoint` credential points token and Graph requests at
/// `server`.
pub(crate) fn test_ctx(server: &MockServer) -> Context {
    let values = HashMap::from([
        ("tenant_id".to_string(), "tenant-1".to_string()),
        ("client_id".to_string(), "client-1".to_string()),
        ("client_secret".to_string(), "secret-1".to_string()),
        ("site_url".to_string(), SITE_URL.to_string()),
        (
            "token_endpoint".to_string(),
            format!("{}/token", server.uri()),
        ),
        ("endpoint".to_string(), format!("{}/v1.0", server.uri())),
    ]);
    Context::with_metadata("req-1", "instance-1").with_credential("sharepoint", values)
}

/// Mounts the token, site and drive responses every session needs.
pub(crate) async fn mount_identity(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"access_token":"test-token","expires_in":3599}"#,
            "application/json",
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/sites/contoso.sharepoint.com:/sites/Marketing"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"id":"site-1","name":"Marketing"}"#, "application/json"),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/sites/site-1/drives"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"value":[{"id":"drive-1","name":"Documents"}]}"#,
            "application/json",
        ))
        .mount(server)
        .await;
}

/// Mounts a single-page children listing at `route`.
pub(crate) async fn mount_children(server: &MockServer, route: &str, entries: &[String]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(r#"{{"value":[{}]}}"#, entries.join(",")),
            "application/json",
        ))
        .mount(server)
        .await;
}

/// JSON for a file entry.
pub(crate) fn file_json(id: &str, name: &str, modified: &str) -> String {
    format!(
        r#"{{"id":"{id}","name":"{name}","size":3,"lastModifiedDateTime":"{modified}","file":{{"mimeType":"text/plain"}}}}"#
    )
}

/// JSON for a folder entry.
pub(crate) fn folder_json(name: &str) -> String {
    format!(r#"{{"id":"dir-{name}","name":"{name}","folder":{{"childCount":1}}}}"#)
}

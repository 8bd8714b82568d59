//! RFC 9728 Protected Resource Metadata and RFC 8414 Authorization Server
//! Metadata discovery.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OAuthFlowError;
use crate::resource::normalize_resource_uri;

/// RFC 9728 Protected Resource Metadata, as returned from a resource
/// server's `.well-known/oauth-protected-resource` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// RFC 8414 Authorization Server Metadata, the fields this handshake needs.
/// Extra fields an authorization server advertises are kept in
/// `additional` rather than discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

/// Fetches Protected Resource Metadata for `resource_url`, trying (in
/// order) the URL advertised in a `WWW-Authenticate` challenge, then the
/// per-resource and root well-known fallback locations RFC 9728 defines.
/// The first location that returns a successful, parseable document wins.
pub async fn fetch_protected_resource_metadata(
    http: &reqwest::Client,
    resource_url: &str,
    advertised_url: Option<&str>,
) -> Result<ProtectedResourceMetadata, OAuthFlowError> {
    let resource = Url::parse(resource_url)?;
    let mut candidates: Vec<String> = Vec::new();
    if let Some(url) = advertised_url {
        candidates.push(url.to_string());
    }
    candidates.push(well_known_under_path(&resource, "oauth-protected-resource")?);
    candidates.push(well_known_at_root(&resource, "oauth-protected-resource")?);

    let mut last_err = None;
    for candidate in candidates {
        match fetch_json::<ProtectedResourceMetadata>(http, &candidate).await {
            Ok(metadata) => {
                let expected = normalize_resource_uri(&resource);
                let found = Url::parse(&metadata.resource)
                    .map(|u| normalize_resource_uri(&u))
                    .unwrap_or_else(|_| metadata.resource.clone());
                if found != expected {
                    return Err(OAuthFlowError::ResourceMismatch {
                        found: metadata.resource,
                        expected: resource_url.to_string(),
                    });
                }
                return Ok(metadata);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or(OAuthFlowError::NoAuthorizationServer))
}

/// Fetches RFC 8414 Authorization Server Metadata for `issuer`, falling
/// back to `<issuer>/authorize` and `<issuer>/token` when no metadata
/// document is found.
pub async fn fetch_authorization_server_metadata(
    http: &reqwest::Client,
    issuer: &str,
) -> Result<AuthorizationServerMetadata, OAuthFlowError> {
    let issuer_url = Url::parse(issuer)?;
    let well_known = well_known_under_path(&issuer_url, "oauth-authorization-server")?;

    match fetch_json::<AuthorizationServerMetadata>(http, &well_known).await {
        Ok(metadata) => Ok(metadata),
        Err(_) => Ok(AuthorizationServerMetadata {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{}/authorize", issuer.trim_end_matches('/')),
            token_endpoint: Some(format!("{}/token", issuer.trim_end_matches('/'))),
            registration_endpoint: None,
            scopes_supported: None,
            code_challenge_methods_supported: None,
            additional: HashMap::new(),
        }),
    }
}

async fn fetch_json<T: for<'de> Deserialize<'de>>(
    http: &reqwest::Client,
    url: &str,
) -> Result<T, OAuthFlowError> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.json::<T>().await?)
}

/// `https://host/.well-known/<name><path>` — the per-resource location.
fn well_known_under_path(base: &Url, name: &str) -> Result<String, OAuthFlowError> {
    let mut well_known = base.clone();
    let suffix = base.path().trim_start_matches('/');
    well_known.set_path(&format!(".well-known/{name}/{suffix}"));
    Ok(well_known.to_string().trim_end_matches('/').to_string())
}

/// `https://host/.well-known/<name>` — the root fallback location.
fn well_known_at_root(base: &Url, name: &str) -> Result<String, OAuthFlowError> {
    let mut well_known = base.clone();
    well_known.set_path(&format!(".well-known/{name}"));
    Ok(well_known.to_string())
}

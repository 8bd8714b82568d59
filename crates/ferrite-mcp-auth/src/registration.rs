//! Client registration resolution: Client ID Metadata Document, then static
//! pre-registered credentials, then RFC 7591 Dynamic Client Registration —
//! tried in that priority order.

use serde::{Deserialize, Serialize};

use crate::config::ClientRegistrationMode;
use crate::error::OAuthFlowError;

/// The client identity resolved for one authorization server, regardless
/// of which registration mode produced it.
#[derive(Debug, Clone)]
pub struct ResolvedClient {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// A Client ID Metadata Document, fetched from the URL that serves as the
/// client's own `client_id` (a non-root HTTPS URL is the identity itself —
/// no separate registration step with the authorization server).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClientIdMetadataDocument {
    client_id: Option<String>,
    redirect_uris: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RegistrationRequest<'a> {
    client_name: &'a str,
    redirect_uris: &'a [String],
    grant_types: Vec<&'static str>,
    response_types: Vec<&'static str>,
    token_endpoint_auth_method: &'static str,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

/// Resolves this runtime's client identity with `authorization_server`,
/// per the configured [`ClientRegistrationMode`].
pub async fn resolve_client(
    http: &reqwest::Client,
    mode: &ClientRegistrationMode,
    registration_endpoint: Option<&str>,
    redirect_uri: &str,
    client_name: &str,
) -> Result<ResolvedClient, OAuthFlowError> {
    match mode {
        ClientRegistrationMode::Cimd(url) => resolve_via_cimd(http, url, redirect_uri).await,
        ClientRegistrationMode::Static { client_id, client_secret } => Ok(ResolvedClient {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        }),
        ClientRegistrationMode::Dynamic => {
            let endpoint = registration_endpoint.ok_or(OAuthFlowError::NoClientRegistration)?;
            resolve_via_dcr(http, endpoint, redirect_uri, client_name).await
        }
    }
}

async fn resolve_via_cimd(
    http: &reqwest::Client,
    url: &str,
    redirect_uri: &str,
) -> Result<ResolvedClient, OAuthFlowError> {
    let document: ClientIdMetadataDocument = http
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if !document.redirect_uris.iter().any(|u| u == redirect_uri) {
        return Err(OAuthFlowError::InvalidMetadata(
            "redirect_uri is not listed in the client's metadata document".into(),
        ));
    }

    Ok(ResolvedClient {
        client_id: document.client_id.unwrap_or_else(|| url.to_string()),
        client_secret: None,
    })
}

async fn resolve_via_dcr(
    http: &reqwest::Client,
    registration_endpoint: &str,
    redirect_uri: &str,
    client_name: &str,
) -> Result<ResolvedClient, OAuthFlowError> {
    let redirect_uris = [redirect_uri.to_string()];
    let request = RegistrationRequest {
        client_name,
        redirect_uris: &redirect_uris,
        grant_types: vec!["authorization_code", "refresh_token"],
        response_types: vec!["code"],
        token_endpoint_auth_method: "none",
    };

    let response = http
        .post(registration_endpoint)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(OAuthFlowError::RegistrationFailed(format!(
            "registration server returned {}",
            response.status()
        )));
    }

    let registered: RegistrationResponse = response.json().await?;
    Ok(ResolvedClient {
        client_id: registered.client_id,
        client_secret: registered.client_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn static_mode_resolves_without_a_network_call() {
        let mode = ClientRegistrationMode::Static {
            client_id: "preregistered-client".to_string(),
            client_secret: Some("shh".to_string()),
        };
        let resolved = resolve_client(
            &reqwest::Client::new(),
            &mode,
            None,
            "https://client.example.com/callback",
            "test-client",
        )
        .await
        .unwrap();
        assert_eq!(resolved.client_id, "preregistered-client");
    }

    #[tokio::test]
    async fn dcr_mode_requires_a_registration_endpoint() {
        let err = resolve_client(
            &reqwest::Client::new(),
            &ClientRegistrationMode::Dynamic,
            None,
            "https://client.example.com/callback",
            "test-client",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OAuthFlowError::NoClientRegistration));
    }

    #[tokio::test]
    async fn dcr_mode_registers_against_the_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "client_id": "dcr-client-1",
                "client_secret": "generated-secret",
            })))
            .mount(&server)
            .await;

        let resolved = resolve_client(
            &reqwest::Client::new(),
            &ClientRegistrationMode::Dynamic,
            Some(&format!("{}/register", server.uri())),
            "https://client.example.com/callback",
            "test-client",
        )
        .await
        .unwrap();

        assert_eq!(resolved.client_id, "dcr-client-1");
        assert_eq!(resolved.client_secret.as_deref(), Some("generated-secret"));
    }

    #[tokio::test]
    async fn cimd_mode_rejects_an_unlisted_redirect_uri() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "client_id": format!("{}/client-metadata", server.uri()),
                "redirect_uris": ["https://other.example.com/callback"],
            })))
            .mount(&server)
            .await;

        let err = resolve_client(
            &reqwest::Client::new(),
            &ClientRegistrationMode::Cimd(format!("{}/client-metadata", server.uri())),
            None,
            "https://client.example.com/callback",
            "test-client",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OAuthFlowError::InvalidMetadata(_)));
    }
}

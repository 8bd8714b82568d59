//! The stateful, reentrant two-phase outbound OAuth handshake: initiate on
//! a `401`/`403` challenge, finalize once the redirect callback lands, then
//! exchange the authorization code for a token.

use std::sync::Arc;

use rand::RngCore;
use tokio::sync::Mutex;
use url::Url;

use crate::config::OAuthClientConfig;
use crate::discovery::{fetch_authorization_server_metadata, fetch_protected_resource_metadata, AuthorizationServerMetadata};
use crate::error::OAuthFlowError;
use crate::pkce::{self, PkcePair};
use crate::registration::{self, ResolvedClient};

/// A successful token exchange or refresh.
#[derive(Debug, Clone)]
pub struct ExchangedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// Parses the `resource_metadata` parameter out of a `WWW-Authenticate:
/// Bearer ...` header value.
pub fn parse_resource_metadata_url(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let part = part.trim();
        let rest = part.strip_prefix("resource_metadata=")?;
        Some(rest.trim_matches('"').to_string())
    })
}

struct PendingAuthorization {
    code_verifier: String,
    csrf_state: String,
    authorization_code: Option<String>,
}

/// One authorization-code+PKCE flow against a single resource. Not
/// `Send`-shared on its own — wrap in [`OAuthHandshake`] to serialize
/// concurrent reauthorization attempts onto a single flow instance.
pub struct AuthorizationFlow {
    config: OAuthClientConfig,
    resource_url: String,
    resolved_client: Option<ResolvedClient>,
    auth_server: Option<AuthorizationServerMetadata>,
    pending: Option<PendingAuthorization>,
}

impl AuthorizationFlow {
    pub fn new(config: OAuthClientConfig, resource_url: impl Into<String>) -> Self {
        Self {
            config,
            resource_url: resource_url.into(),
            resolved_client: None,
            auth_server: None,
            pending: None,
        }
    }

    /// Phase 1: resolves the authorization server and this client's
    /// identity with it, builds the authorization URL, and returns it for
    /// the caller's presenter callback. A previously resolved client
    /// identity is reused (scope step-up re-invokes this without
    /// re-registering).
    pub async fn initiate(
        &mut self,
        http: &reqwest::Client,
        www_authenticate: Option<&str>,
    ) -> Result<String, OAuthFlowError> {
        let advertised = www_authenticate.and_then(parse_resource_metadata_url);
        let resource_metadata =
            fetch_protected_resource_metadata(http, &self.resource_url, advertised.as_deref()).await?;

        let auth_server_url = resource_metadata
            .authorization_servers
            .first()
            .ok_or(OAuthFlowError::NoAuthorizationServer)?
            .clone();
        let auth_server = fetch_authorization_server_metadata(http, &auth_server_url).await?;

        if self.resolved_client.is_none() {
            self.resolved_client = Some(
                registration::resolve_client(
                    http,
                    &self.config.registration,
                    auth_server.registration_endpoint.as_deref(),
                    &self.config.redirect_uri,
                    &self.config.client_name,
                )
                .await?,
            );
        }
        let client = self.resolved_client.as_ref().expect("just resolved");

        let PkcePair { verifier, challenge } = pkce::generate();
        let csrf_state = {
            let mut bytes = [0u8; 16];
            rand::rng().fill_bytes(&mut bytes);
            bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
        };

        let mut url = Url::parse(&auth_server.authorization_endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &client.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("code_challenge", &challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("resource", &self.resource_url);
            query.append_pair("state", &csrf_state);
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
        }

        self.auth_server = Some(auth_server);
        self.pending = Some(PendingAuthorization {
            code_verifier: verifier,
            csrf_state,
            authorization_code: None,
        });

        Ok(url.to_string())
    }

    /// Phase 2, part one: records the authorization code once the redirect
    /// callback lands, after checking `state` against the value generated
    /// in `initiate` to guard against CSRF.
    pub fn finalize(&mut self, code: String, state: String) -> Result<(), OAuthFlowError> {
        let pending = self.pending.as_mut().ok_or(OAuthFlowError::NotInitiated)?;
        if pending.csrf_state != state {
            return Err(OAuthFlowError::StateMismatch);
        }
        pending.authorization_code = Some(code);
        Ok(())
    }

    /// Phase 2, part two: called when the transport retries the original
    /// request and finds a stored code. Exchanges it for an access token;
    /// the flow's resolved client identity and authorization server stay
    /// cached for a subsequent refresh or scope step-up.
    pub async fn exchange(&mut self, http: &reqwest::Client) -> Result<ExchangedToken, OAuthFlowError> {
        let code = self
            .pending
            .as_ref()
            .and_then(|p| p.authorization_code.clone())
            .ok_or(OAuthFlowError::NotInitiated)?;
        let code_verifier = self
            .pending
            .as_ref()
            .map(|p| p.code_verifier.clone())
            .ok_or(OAuthFlowError::NotInitiated)?;
        let client = self.resolved_client.as_ref().ok_or(OAuthFlowError::NotInitiated)?;
        let auth_server = self.auth_server.as_ref().ok_or(OAuthFlowError::NotInitiated)?;
        let token_endpoint = auth_server
            .token_endpoint
            .as_deref()
            .ok_or_else(|| OAuthFlowError::InvalidMetadata("authorization server has no token_endpoint".into()))?;

        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("client_id", client.client_id.clone()),
            ("code_verifier", code_verifier),
            ("resource", self.resource_url.clone()),
        ];
        if let Some(secret) = &client.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let token = post_token_request(http, token_endpoint, &params).await?;
        self.pending = None;
        Ok(token)
    }

    /// Uses a previously issued refresh token to obtain a fresh access
    /// token without user interaction.
    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        refresh_token: &str,
    ) -> Result<ExchangedToken, OAuthFlowError> {
        let client = self.resolved_client.as_ref().ok_or(OAuthFlowError::NotInitiated)?;
        let auth_server = self.auth_server.as_ref().ok_or(OAuthFlowError::NotInitiated)?;
        let token_endpoint = auth_server
            .token_endpoint
            .as_deref()
            .ok_or_else(|| OAuthFlowError::InvalidMetadata("authorization server has no token_endpoint".into()))?;

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", client.client_id.clone()),
        ];
        if let Some(secret) = &client.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        post_token_request(http, token_endpoint, &params).await
    }
}

async fn post_token_request(
    http: &reqwest::Client,
    token_endpoint: &str,
    params: &[(&str, String)],
) -> Result<ExchangedToken, OAuthFlowError> {
    #[derive(serde::Deserialize)]
    struct TokenResponse {
        access_token: Option<String>,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
        scope: Option<String>,
    }

    let response = http.post(token_endpoint).form(params).send().await?;
    if !response.status().is_success() {
        return Err(OAuthFlowError::OAuthError(format!(
            "token endpoint returned {}",
            response.status()
        )));
    }
    let body: TokenResponse = response.json().await?;
    let access_token = body.access_token.ok_or(OAuthFlowError::MissingAccessToken)?;

    Ok(ExchangedToken {
        access_token,
        refresh_token: body.refresh_token,
        expires_in: body.expires_in,
        scope: body.scope,
    })
}

/// Wraps a single [`AuthorizationFlow`] in a `tokio::sync::Mutex` so a
/// client transport can serialize concurrent callers onto at most one
/// authorization flow at a time.
#[derive(Clone)]
pub struct OAuthHandshake {
    flow: Arc<Mutex<AuthorizationFlow>>,
}

impl OAuthHandshake {
    pub fn new(config: OAuthClientConfig, resource_url: impl Into<String>) -> Self {
        Self {
            flow: Arc::new(Mutex::new(AuthorizationFlow::new(config, resource_url))),
        }
    }

    pub async fn initiate(
        &self,
        http: &reqwest::Client,
        www_authenticate: Option<&str>,
    ) -> Result<String, OAuthFlowError> {
        self.flow.lock().await.initiate(http, www_authenticate).await
    }

    pub async fn finalize(&self, code: String, state: String) -> Result<(), OAuthFlowError> {
        self.flow.lock().await.finalize(code, state)
    }

    pub async fn exchange(&self, http: &reqwest::Client) -> Result<ExchangedToken, OAuthFlowError> {
        self.flow.lock().await.exchange(http).await
    }

    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        refresh_token: &str,
    ) -> Result<ExchangedToken, OAuthFlowError> {
        self.flow.lock().await.refresh(http, refresh_token).await
    }
}

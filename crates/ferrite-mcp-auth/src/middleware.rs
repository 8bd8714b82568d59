use std::sync::Arc;

use http::{HeaderMap, StatusCode};

use crate::config::BearerAuthConfig;
use crate::error::VerifyError;
use crate::token::{unix_now, TokenInfo};
use crate::verifier::TokenVerifier;
use crate::www_authenticate::{extract_bearer_token, WwwAuthenticateBuilder};

/// What a rejected request should carry back to the client: a status code,
/// the body text to write back, and, where applicable, a `WWW-Authenticate`
/// header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
    pub www_authenticate: Option<String>,
}

impl Rejection {
    fn new(status: StatusCode, message: impl Into<String>, www_authenticate: Option<String>) -> Self {
        Self { status, message: message.into(), www_authenticate }
    }
}

/// The bearer-token access gate: extracts and verifies the `Authorization`
/// header, enforces required scopes, and builds RFC 9728 challenges on
/// rejection. Transport-agnostic — wraps a [`TokenVerifier`] and operates
/// on a plain [`HeaderMap`], so callers can place it in front of any HTTP
/// framework's middleware chain.
pub struct BearerGate {
    verifier: Arc<dyn TokenVerifier>,
    config: BearerAuthConfig,
}

impl BearerGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>, config: BearerAuthConfig) -> Self {
        Self { verifier, config }
    }

    fn challenge(&self, error: Option<&str>) -> Option<String> {
        let url = self.config.resource_metadata_url.as_ref()?;
        let mut builder = WwwAuthenticateBuilder::new(url.clone());
        if let Some(scope) = self.config.required_scopes.first() {
            builder = builder.with_scope(scope.clone());
        }
        if let Some(error) = error {
            builder = builder.with_error(error.to_string());
        }
        Some(builder.build())
    }

    /// Validates `headers` and returns the attached [`TokenInfo`] on
    /// success, never forwarding the raw token past this call — callers
    /// must not thread it through to any downstream service the handler
    /// invokes.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<TokenInfo, Rejection> {
        let header = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Rejection::new(StatusCode::UNAUTHORIZED, "no bearer token", self.challenge(None)))?;

        let token = extract_bearer_token(header)
            .map_err(|_| Rejection::new(StatusCode::UNAUTHORIZED, "no bearer token", self.challenge(None)))?;

        let info = match self.verifier.verify(token).await {
            Ok(info) => info,
            Err(VerifyError::OAuthError(message)) => {
                return Err(Rejection::new(
                    StatusCode::BAD_REQUEST,
                    message.clone(),
                    self.challenge(Some(&message)),
                ));
            }
            Err(error) => {
                return Err(Rejection::new(
                    StatusCode::UNAUTHORIZED,
                    error.to_string(),
                    self.challenge(Some("invalid_token")),
                ));
            }
        };

        let now = unix_now();
        if info.expires_at.is_none() {
            return Err(Rejection::new(
                StatusCode::UNAUTHORIZED,
                "token missing expiration",
                self.challenge(Some("invalid_token")),
            ));
        }
        if info.is_expired(now) {
            return Err(Rejection::new(
                StatusCode::UNAUTHORIZED,
                "token expired",
                self.challenge(Some("invalid_token")),
            ));
        }
        if info.is_not_yet_valid(now) {
            return Err(Rejection::new(
                StatusCode::UNAUTHORIZED,
                "token not yet valid",
                self.challenge(Some("invalid_token")),
            ));
        }

        if let Some(missing) = self
            .config
            .required_scopes
            .iter()
            .find(|scope| !info.has_scope(scope))
        {
            return Err(Rejection::new(
                StatusCode::FORBIDDEN,
                "insufficient scope",
                self.challenge(Some(&format!("insufficient_scope: {missing}"))),
            ));
        }

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BearerAuthConfigBuilder;
    use crate::verifier::StaticTokenVerifier;
    use http::HeaderValue;

    fn headers_with_bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn accepts_a_valid_unexpired_token_with_required_scope() {
        let verifier = Arc::new(
            StaticTokenVerifier::new().with_token(
                "tok-1",
                TokenInfo::new("user-1")
                    .with_expires_at(unix_now() + 3600)
                    .with_scopes(["mcp:read".to_string()]),
            ),
        );
        let gate = BearerGate::new(
            verifier,
            BearerAuthConfigBuilder::new().with_required_scope("mcp:read").build(),
        );

        let info = gate.authenticate(&headers_with_bearer("tok-1")).await.unwrap();
        assert_eq!(info.subject, "user-1");
    }

    #[tokio::test]
    async fn missing_header_yields_401_with_challenge() {
        let verifier = Arc::new(StaticTokenVerifier::new());
        let gate = BearerGate::new(
            verifier,
            BearerAuthConfigBuilder::new()
                .with_resource_metadata_url("https://api.example.com/.well-known/oauth-protected-resource")
                .build(),
        );

        let rejection = gate.authenticate(&HeaderMap::new()).await.unwrap_err();
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.message, "no bearer token");
        assert!(rejection.www_authenticate.unwrap().contains("resource_metadata"));
    }

    #[tokio::test]
    async fn malformed_bearer_scheme_is_rejected_with_no_bearer_token() {
        let verifier = Arc::new(StaticTokenVerifier::new());
        let gate = BearerGate::new(verifier, BearerAuthConfig::default());

        let mut headers = HeaderMap::new();
        headers.insert(http::header::AUTHORIZATION, HeaderValue::from_static("Basic deadbeef"));
        let rejection = gate.authenticate(&headers).await.unwrap_err();
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.message, "no bearer token");
    }

    #[tokio::test]
    async fn expired_token_is_rejected_with_401() {
        let verifier = Arc::new(
            StaticTokenVerifier::new().with_token("tok-1", TokenInfo::new("user-1").with_expires_at(1)),
        );
        let gate = BearerGate::new(verifier, BearerAuthConfig::default());

        let rejection = gate.authenticate(&headers_with_bearer("tok-1")).await.unwrap_err();
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.message, "token expired");
    }

    #[tokio::test]
    async fn token_with_no_expiration_is_rejected_with_401() {
        let verifier = Arc::new(StaticTokenVerifier::new().with_token("tok-1", TokenInfo::new("user-1")));
        let gate = BearerGate::new(verifier, BearerAuthConfig::default());

        let rejection = gate.authenticate(&headers_with_bearer("tok-1")).await.unwrap_err();
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
        assert_eq!(rejection.message, "token missing expiration");
    }

    #[tokio::test]
    async fn missing_required_scope_is_rejected_with_403() {
        let verifier = Arc::new(
            StaticTokenVerifier::new()
                .with_token("tok-1", TokenInfo::new("user-1").with_expires_at(unix_now() + 3600)),
        );
        let gate = BearerGate::new(
            verifier,
            BearerAuthConfigBuilder::new().with_required_scope("mcp:admin").build(),
        );

        let rejection = gate.authenticate(&headers_with_bearer("tok-1")).await.unwrap_err();
        assert_eq!(rejection.status, StatusCode::FORBIDDEN);
        assert_eq!(rejection.message, "insufficient scope");
    }

    #[tokio::test]
    async fn unknown_token_is_rejected_with_401() {
        let verifier = Arc::new(StaticTokenVerifier::new());
        let gate = BearerGate::new(verifier, BearerAuthConfig::default());

        let rejection = gate.authenticate(&headers_with_bearer("nope")).await.unwrap_err();
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
    }
}

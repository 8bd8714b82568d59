use thiserror::Error;

/// Why a bearer-verifier rejected a request. Maps 1:1 onto the status codes
/// the middleware returns: `InvalidToken`/`Expired`/`NotYetValid` → 401,
/// `MissingScope` → 403, `OAuthError` → 400.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("missing or malformed Authorization header")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("token has no expiration")]
    MissingExpiration,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token lacks required scope {0:?}")]
    MissingScope(String),
    #[error("authorization server error: {0}")]
    OAuthError(String),
}

/// Errors from the outbound OAuth handshake: discovery, client registration,
/// and the authorization-code exchange.
#[derive(Debug, Error)]
pub enum OAuthFlowError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed server response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("protected resource metadata 'resource' field {found:?} does not match requested resource {expected:?}")]
    ResourceMismatch { found: String, expected: String },
    #[error("no authorization server advertised by protected resource metadata")]
    NoAuthorizationServer,
    #[error("no client registration mode available (no CIMD url, no static credentials, dynamic registration disabled or failed)")]
    NoClientRegistration,
    #[error("dynamic client registration failed: {0}")]
    RegistrationFailed(String),
    #[error("state parameter mismatch; possible CSRF")]
    StateMismatch,
    #[error("finalize called before initiate (no client resolved)")]
    NotInitiated,
    #[error("token endpoint returned no access_token")]
    MissingAccessToken,
    #[error("{0}")]
    InvalidMetadata(String),
}

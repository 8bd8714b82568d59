//! Two independent concerns sharing one crate because both are "auth" at
//! the edges of a connection: a bearer-token access gate for inbound
//! requests, and an outbound OAuth 2.1 + PKCE handshake a client transport
//! drives when a server challenges it.
//!
//! Neither depends on `ferrite-mcp-protocol` — both operate purely on HTTP
//! headers and network calls, so a caller wires them into whatever
//! transport layer it's using (an axum middleware stack, a `reqwest`
//! client wrapper, …).

mod config;
mod discovery;
mod error;
mod flow;
mod middleware;
mod pkce;
mod registration;
mod resource;
mod token;
mod verifier;
mod www_authenticate;

pub use config::{
    BearerAuthConfig, BearerAuthConfigBuilder, ClientRegistrationMode, OAuthClientConfig,
    OAuthClientConfigBuilder,
};
pub use discovery::{
    fetch_authorization_server_metadata, fetch_protected_resource_metadata, AuthorizationServerMetadata,
    ProtectedResourceMetadata,
};
pub use error::{OAuthFlowError, VerifyError};
pub use flow::{parse_resource_metadata_url, AuthorizationFlow, ExchangedToken, OAuthHandshake};
pub use middleware::{BearerGate, Rejection};
pub use pkce::{generate as generate_pkce, PkcePair};
pub use registration::{resolve_client, ResolvedClient};
pub use resource::{audience_matches, normalize_resource_uri, validate_canonical_resource_uri};
pub use token::TokenInfo;
pub use verifier::{StaticTokenVerifier, TokenVerifier};
pub use www_authenticate::{extract_bearer_token, WwwAuthenticateBuilder};

//! RFC 9728 `WWW-Authenticate` challenge construction and bearer-token
//! extraction from the `Authorization` header.

use crate::error::VerifyError;

/// Extracts the opaque token from an `Authorization: Bearer <token>` header
/// value. The scheme is matched case-insensitively; everything after the
/// single separating space is the token, verbatim.
pub fn extract_bearer_token(authorization_header: &str) -> Result<&str, VerifyError> {
    let (scheme, rest) = authorization_header
        .split_once(' ')
        .ok_or(VerifyError::MissingToken)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(VerifyError::MissingToken);
    }

    if rest.is_empty() {
        return Err(VerifyError::MissingToken);
    }

    Ok(rest)
}

/// Builds the `WWW-Authenticate` header value sent on a rejection, per
/// spec §4.8/RFC 9728 §5.1: `Bearer resource_metadata="<url>"`.
#[derive(Debug, Clone)]
pub struct WwwAuthenticateBuilder {
    resource_metadata_url: String,
    scope: Option<String>,
    error: Option<String>,
}

impl WwwAuthenticateBuilder {
    pub fn new(resource_metadata_url: impl Into<String>) -> Self {
        Self {
            resource_metadata_url: resource_metadata_url.into(),
            scope: None,
            error: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn build(self) -> String {
        let mut parts = vec![format!(
            "Bearer resource_metadata=\"{}\"",
            self.resource_metadata_url
        )];
        if let Some(scope) = self.scope {
            parts.push(format!("scope=\"{scope}\""));
        }
        if let Some(error) = self.error {
            parts.push(format!("error=\"{error}\""));
        }
        parts.join(", ")
    }
}

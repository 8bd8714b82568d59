//! RFC 8707 resource-indicator canonicalization and audience matching.

use url::Url;

use crate::error::OAuthFlowError;

/// Validates that `uri` is a canonical RFC 8707 resource indicator: `http`
/// or `https`, lowercase scheme/host, no fragment.
pub fn validate_canonical_resource_uri(uri: &str) -> Result<(), OAuthFlowError> {
    let scheme_end = uri
        .find("://")
        .ok_or_else(|| OAuthFlowError::InvalidMetadata("resource URI has no scheme".into()))?;
    if uri[..scheme_end] != uri[..scheme_end].to_lowercase() {
        return Err(OAuthFlowError::InvalidMetadata(
            "resource URI scheme must be lowercase".into(),
        ));
    }

    let parsed = Url::parse(uri)?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(OAuthFlowError::InvalidMetadata(
            "resource URI must use http or https".into(),
        ));
    }
    if parsed.fragment().is_some() {
        return Err(OAuthFlowError::InvalidMetadata(
            "resource URI must not contain a fragment".into(),
        ));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| OAuthFlowError::InvalidMetadata("resource URI must include a host".into()))?;
    if host != host.to_lowercase() {
        return Err(OAuthFlowError::InvalidMetadata(
            "resource URI host must be lowercase".into(),
        ));
    }

    Ok(())
}

/// Normalizes a resource/audience URI per RFC 8707 §2: lowercase
/// scheme+host, default ports dropped, trailing slash on bare paths
/// trimmed.
pub fn normalize_resource_uri(url: &Url) -> String {
    let mut out = String::new();
    out.push_str(&url.scheme().to_lowercase());
    out.push_str("://");
    if let Some(host) = url.host_str() {
        out.push_str(&host.to_lowercase());
    }
    if let Some(port) = url.port() {
        let default_port = match url.scheme() {
            "http" => 80,
            "https" => 443,
            _ => 0,
        };
        if port != default_port {
            out.push(':');
            out.push_str(&port.to_string());
        }
    }
    let path = url.path();
    if path != "/" {
        out.push_str(path.trim_end_matches('/'));
    }
    out
}

/// Returns whether a token's audience matches the server's canonical
/// resource URI, comparing in constant time to avoid leaking a partial
/// match through timing.
pub fn audience_matches(token_aud: &str, server_uri: &str) -> bool {
    let (Ok(token_url), Ok(server_url)) = (Url::parse(token_aud), Url::parse(server_uri)) else {
        return false;
    };
    let token_normalized = normalize_resource_uri(&token_url);
    let server_normalized = normalize_resource_uri(&server_url);
    subtle::ConstantTimeEq::ct_eq(token_normalized.as_bytes(), server_normalized.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_uri_accepts_https_and_rejects_fragment() {
        assert!(validate_canonical_resource_uri("https://example.com/resource").is_ok());
        assert!(validate_canonical_resource_uri("https://example.com/resource#frag").is_err());
        assert!(validate_canonical_resource_uri("HTTPS://example.com").is_err());
        assert!(validate_canonical_resource_uri("ftp://example.com").is_err());
    }

    #[test]
    fn audience_matches_ignores_default_port_and_case() {
        assert!(audience_matches("https://API.example.com:443/mcp", "https://api.example.com/mcp"));
        assert!(!audience_matches("https://api.example.com:8080", "https://api.example.com"));
        assert!(!audience_matches("https://api.example.com/other", "https://api.example.com/mcp"));
    }
}

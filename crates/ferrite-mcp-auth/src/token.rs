use std::time::{SystemTime, UNIX_EPOCH};

/// What a [`crate::verifier::TokenVerifier`] reports back about an access
/// token. Carries just enough for the middleware to enforce expiration and
/// scope; anything provider-specific belongs in `extra`.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub subject: String,
    /// Unix timestamp (seconds). `None` is rejected by the middleware —
    /// every token this runtime accepts must carry an expiration.
    pub expires_at: Option<u64>,
    /// Unix timestamp (seconds); token is rejected if this is in the future.
    pub not_before: Option<u64>,
    pub scopes: Vec<String>,
    pub client_id: Option<String>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenInfo {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            expires_at: None,
            not_before: None,
            scopes: Vec::new(),
            client_id: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_not_before(mut self, not_before: u64) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = String>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_none_or(|exp| now > exp)
    }

    pub fn is_not_yet_valid(&self, now: u64) -> bool {
        self.not_before.is_some_and(|nbf| nbf > now)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_and_scope_checks() {
        let token = TokenInfo::new("user-1")
            .with_expires_at(200)
            .with_not_before(50)
            .with_scopes(["read".to_string(), "write".to_string()]);

        assert!(!token.is_expired(199));
        assert!(token.is_expired(201));
        assert!(!token.is_not_yet_valid(50));
        assert!(token.is_not_yet_valid(49));
        assert!(token.has_scope("read"));
        assert!(!token.has_scope("admin"));
    }

    #[test]
    fn missing_expiration_counts_as_expired() {
        let token = TokenInfo::new("user-1");
        assert!(token.is_expired(unix_now()));
    }
}

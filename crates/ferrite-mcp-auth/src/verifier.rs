use async_trait::async_trait;

use crate::error::VerifyError;
use crate::token::TokenInfo;

/// Validates an opaque bearer token and reports back what it's good for.
///
/// No JWT (or any other token format) library is fixed here: a caller wires
/// in whatever validates tokens issued by their authorization server
/// (introspection RPC, local JWT verification, a static test double). This
/// runtime only needs the result.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TokenInfo, VerifyError>;
}

/// A verifier over a fixed table of tokens, for tests and local development.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: std::collections::HashMap<String, TokenInfo>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, info: TokenInfo) -> Self {
        self.tokens.insert(token.into(), info);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<TokenInfo, VerifyError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(VerifyError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_verifier_looks_up_registered_tokens() {
        let verifier = StaticTokenVerifier::new()
            .with_token("tok-1", TokenInfo::new("user-1").with_expires_at(u64::MAX));

        assert_eq!(verifier.verify("tok-1").await.unwrap().subject, "user-1");
        assert!(matches!(
            verifier.verify("unknown").await,
            Err(VerifyError::InvalidToken)
        ));
    }
}

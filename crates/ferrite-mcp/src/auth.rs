//! Wires [`BearerGate`] into an axum middleware stack — the only place in
//! the workspace `axum` and `ferrite-mcp-auth` are used together, since
//! `ferrite-mcp-auth` itself stays transport-agnostic.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Router;
use ferrite_mcp_auth::{BearerGate, Rejection};

/// Layers `gate` onto `router`: every request must carry a valid bearer
/// token before reaching the streamable HTTP handlers underneath.
pub fn with_bearer_gate(router: Router, gate: Arc<BearerGate>) -> Router {
    router.layer(axum::middleware::from_fn_with_state(gate, bearer_gate_middleware))
}

async fn bearer_gate_middleware(State(gate): State<Arc<BearerGate>>, request: Request, next: Next) -> Response {
    match gate.authenticate(request.headers()).await {
        Ok(_token) => next.run(request).await,
        Err(rejection) => rejection_response(rejection),
    }
}

fn rejection_response(rejection: Rejection) -> Response {
    match rejection.www_authenticate {
        Some(value) => {
            (rejection.status, [(axum::http::header::WWW_AUTHENTICATE, value)], rejection.message).into_response()
        }
        None => (rejection.status, rejection.message).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use ferrite_mcp_auth::{BearerAuthConfig, StaticTokenVerifier, TokenInfo};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router(verifier: StaticTokenVerifier) -> Router {
        let gate = Arc::new(BearerGate::new(Arc::new(verifier), BearerAuthConfig::default()));
        with_bearer_gate(Router::new().route("/mcp", get(|| async { "ok" })), gate)
    }

    #[tokio::test]
    async fn valid_bearer_token_reaches_the_handler() {
        // year 2100, far enough out not to need the crate's own clock helper
        let verifier =
            StaticTokenVerifier::new().with_token("tok-1", TokenInfo::new("user-1").with_expires_at(4_102_444_800));
        let router = test_router(verifier);

        let request = axum::http::Request::builder()
            .uri("/mcp")
            .header("authorization", "Bearer tok-1")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_bearer_token_is_rejected_with_401() {
        let router = test_router(StaticTokenVerifier::new());

        let request = axum::http::Request::builder().uri("/mcp").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "no bearer token".as_bytes());
    }
}

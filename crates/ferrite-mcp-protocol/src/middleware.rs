use async_trait::async_trait;
use ferrite_mcp_core::{McpError, RequestContext};
use serde_json::Value;

/// A hook invoked around every inbound request this `Peer` dispatches to a
/// handler. Implementations run in registration order on the way in and
/// reverse order on the way out, the same nesting rule `tower::Layer`
/// stacks use.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Return `Err` to short-circuit dispatch before the handler runs.
    async fn before_request(
        &self,
        _ctx: &RequestContext,
        _method: &str,
        _params: &Option<Value>,
    ) -> Result<(), McpError> {
        Ok(())
    }

    async fn after_response(
        &self,
        _ctx: &RequestContext,
        _method: &str,
        _result: &Result<Value, McpError>,
    ) {
    }
}

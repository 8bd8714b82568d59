use crate::handlers::{ElicitationHandler, RootsHandler, SamplingHandler, ServerNotificationHandler};
use async_trait::async_trait;
use ferrite_mcp_core::{McpError, RequestContext};
use ferrite_mcp_protocol::{NotificationHandler, RequestHandler};
use ferrite_mcp_types::{CreateMessageParams, ElicitRequestedSchema};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// The client role's half of a [`ferrite_mcp_protocol::Peer`]: answers the
/// three request methods a server may send back down the wire, and routes
/// the notifications a server pushes once a session is `Ready`. Built and
/// installed by [`crate::ClientBuilder`]; application code talks to the
/// [`crate::Client`] it hands back instead.
pub(crate) struct ClientSession {
    pub(crate) sampling: Option<Arc<dyn SamplingHandler>>,
    pub(crate) roots: Option<Arc<dyn RootsHandler>>,
    pub(crate) elicitation: Option<Arc<dyn ElicitationHandler>>,
    pub(crate) notifications: Option<Arc<dyn ServerNotificationHandler>>,
}

#[async_trait]
impl RequestHandler for ClientSession {
    async fn handle(&self, ctx: RequestContext, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        match method {
            "ping" => Ok(Value::Object(Default::default())),
            "sampling/createMessage" => {
                let handler = self
                    .sampling
                    .as_ref()
                    .ok_or_else(|| McpError::method_not_found(method))?;
                let params: CreateMessageParams = serde_json::from_value(params.unwrap_or(Value::Null))?;
                let result = handler.create_message(ctx, params).await?;
                Ok(serde_json::to_value(result)?)
            }
            "roots/list" => {
                let handler = self.roots.as_ref().ok_or_else(|| McpError::method_not_found(method))?;
                let roots = handler.list_roots(ctx).await?;
                Ok(serde_json::json!({ "roots": roots }))
            }
            "elicitation/create" => {
                let handler = self
                    .elicitation
                    .as_ref()
                    .ok_or_else(|| McpError::method_not_found(method))?;
                let params = params.ok_or_else(|| McpError::invalid_params("elicitation/create requires params"))?;
                let message = params
                    .get("message")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::invalid_params("elicitation/create requires a `message` string"))?
                    .to_string();
                let schema_value = params
                    .get("requestedSchema")
                    .cloned()
                    .ok_or_else(|| McpError::invalid_params("elicitation/create requires `requestedSchema`"))?;
                let schema: ElicitRequestedSchema = serde_json::from_value(schema_value)?;
                let result = handler.elicit(ctx, message, schema).await?;
                Ok(serde_json::to_value(result)?)
            }
            other => Err(McpError::method_not_found(other)),
        }
    }
}

#[async_trait]
impl NotificationHandler for ClientSession {
    async fn handle(&self, method: &str, params: Option<Value>) {
        let Some(handler) = self.notifications.as_ref() else {
            debug!(method, "unhandled server notification, no handler registered");
            return;
        };
        match method {
            "notifications/tools/list_changed" => handler.on_tools_list_changed().await,
            "notifications/resources/list_changed" => handler.on_resources_list_changed().await,
            "notifications/prompts/list_changed" => handler.on_prompts_list_changed().await,
            "notifications/resources/updated" => {
                if let Some(uri) = params.as_ref().and_then(|p| p.get("uri")).and_then(Value::as_str) {
                    handler.on_resource_updated(uri).await;
                }
            }
            other => debug!(method = other, "unhandled server notification"),
        }
    }
}

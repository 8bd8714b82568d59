use crate::error::{ServerError, ServerResult};
use crate::handlers::{PromptHandler, ResourceHandler, ToolHandler};
use dashmap::{DashMap, DashSet};
use ferrite_mcp_types::{Prompt, Resource, ResourceTemplate, Tool};
use std::sync::Arc;

struct ToolEntry {
    handler: Arc<dyn ToolHandler>,
    validator: jsonschema::Validator,
}

/// Registered tools, keyed by name. A tool's `inputSchema` is compiled into
/// a [`jsonschema::Validator`] once, at registration, so every `tools/call`
/// pays only the cost of validating its own arguments.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn ToolHandler>) -> ServerResult<()> {
        let definition = handler.definition();
        let validator = jsonschema::validator_for(&definition.input_schema)
            .map_err(|e| ServerError::Internal(format!("invalid input schema for tool '{}': {e}", definition.name)))?;
        self.tools.insert(definition.name, ToolEntry { handler, validator });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|e| Arc::clone(&e.handler))
    }

    /// Validate `arguments` against the registered tool's input schema.
    /// `Ok(())` for a tool with no arguments required and `None` supplied.
    pub fn validate(&self, name: &str, arguments: &serde_json::Value) -> ServerResult<()> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ServerError::NotFound(format!("tool '{name}'")))?;
        let errors: Vec<String> = entry
            .validator
            .iter_errors(arguments)
            .map(|e| format!("{}: {e}", e.instance_path))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServerError::InvalidInput(errors.join("; ")))
        }
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|e| e.handler.definition()).collect()
    }
}

/// Registered resources and the URI-templated families they belong to, plus
/// the set of URIs a peer has asked to be kept informed about via
/// `resources/subscribe`.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: DashMap<String, Arc<dyn ResourceHandler>>,
    templates: DashMap<String, ResourceTemplate>,
    subscriptions: DashSet<String>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn ResourceHandler>) {
        self.resources.insert(handler.definition().uri, handler);
    }

    pub fn register_template(&self, template: ResourceTemplate) {
        self.templates.insert(template.uri_template.clone(), template);
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.resources.get(uri).map(|e| Arc::clone(e.value()))
    }

    pub fn definitions(&self) -> Vec<Resource> {
        self.resources.iter().map(|e| e.value().definition()).collect()
    }

    pub fn templates(&self) -> Vec<ResourceTemplate> {
        self.templates.iter().map(|e| e.value().clone()).collect()
    }

    /// Returns `true` if this is a new subscription (the caller should
    /// advertise `resources.subscribe` support before this can be reached —
    /// double-subscribing an already-subscribed URI is idempotent).
    pub fn subscribe(&self, uri: &str) -> ServerResult<()> {
        if !self.resources.contains_key(uri) {
            return Err(ServerError::NotFound(format!("resource '{uri}'")));
        }
        self.subscriptions.insert(uri.to_string());
        Ok(())
    }

    pub fn unsubscribe(&self, uri: &str) {
        self.subscriptions.remove(uri);
    }

    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriptions.contains(uri)
    }

    pub fn subscribed_uris(&self) -> Vec<String> {
        self.subscriptions.iter().map(|e| e.clone()).collect()
    }
}

#[derive(Default)]
pub struct PromptRegistry {
    prompts: DashMap<String, Arc<dyn PromptHandler>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn PromptHandler>) {
        self.prompts.insert(handler.definition().name.clone(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PromptHandler>> {
        self.prompts.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn definitions(&self) -> Vec<Prompt> {
        self.prompts.iter().map(|e| e.value().definition()).collect()
    }
}

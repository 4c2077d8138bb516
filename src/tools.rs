//! # Tool Definition and Execution System
//!
//! A `Tool` is a named callable with a JSON-schema input and a handler. The
//! `ToolRegistry` keeps an insertion-ordered set of tools so the definitions
//! sent to the model are reproducible between runs.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// ============================================================================
// TOOL RESULT
// ============================================================================

/// The outcome of executing a tool.
///
/// `execute` never throws to its caller: a handler panic, schema mismatch, or
/// missing handler all become an `Error` variant here instead of propagating.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// The tool ran successfully; `text` is what the model reads.
    Success(String),
    /// The tool failed; `text` is a human-readable message and `kind` is a
    /// short machine-readable category (e.g. `"not_found"`, `"invalid_input"`).
    Error(String, String),
}

impl ToolResult {
    /// Construct a success result from anything stringifiable.
    pub fn success(text: impl Into<String>) -> Self {
        ToolResult::Success(text.into())
    }

    /// Construct a success result by JSON-encoding a serializable value.
    ///
    /// A handler that returns structured data doesn't need to stringify it
    /// itself; non-string results are serialized to JSON.
    pub fn success_json(value: &impl serde::Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(text) => ToolResult::Success(text),
            Err(e) => ToolResult::Error(format!("failed to serialize result: {e}"), "serialization".to_string()),
        }
    }

    /// Construct an error result.
    pub fn error(text: impl Into<String>, kind: impl Into<String>) -> Self {
        ToolResult::Error(text.into(), kind.into())
    }

    /// The text the model will read, regardless of success/error.
    pub fn text(&self) -> &str {
        match self {
            ToolResult::Success(t) => t,
            ToolResult::Error(t, _) => t,
        }
    }

    /// Whether this result represents a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(..))
    }
}

// ============================================================================
// TOOL TRAIT
// ============================================================================

/// A named callable with a typed input schema, invoked by the model through
/// the ReAct loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable, unique (within a registry) tool name.
    fn name(&self) -> &str;

    /// Human-readable description sent to the model.
    fn description(&self) -> &str;

    /// JSON-Schema object describing the tool's input. `properties` always
    /// serializes as an object, even when there are no parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool against decoded JSON input. Never panics/throws to
    /// the caller; any failure is captured as `ToolResult::Error`.
    async fn execute(&self, input: Value) -> ToolResult;

    /// The wire form sent to the model: `{name, description, input_schema}`.
    fn definition(&self) -> Value {
        serde_json::json!({
            "name": self.name(),
            "description": self.description(),
            "input_schema": self.input_schema(),
        })
    }
}

// ============================================================================
// FUNCTION TOOL (built from ToolBuilder)
// ============================================================================

type AsyncHandler = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> + Send + Sync,
>;

/// A `Tool` implementation assembled by [`ToolBuilder`] from a name,
/// description, parameter list, and async closure.
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    properties: Map<String, Value>,
    required: Vec<String>,
    handler: AsyncHandler,
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("required", &self.required)
            .finish()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": Value::Object(self.properties.clone()),
            "required": self.required,
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        (self.handler)(input).await
    }
}

/// A single named parameter in a [`ToolBuilder`] schema.
#[derive(Debug, Clone)]
pub struct ToolParameter {
    name: String,
    schema: Value,
    required: bool,
}

impl ToolParameter {
    /// A required string parameter.
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: serde_json::json!({"type": "string", "description": description.into()}),
            required: true,
        }
    }

    /// A required number parameter.
    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: serde_json::json!({"type": "number", "description": description.into()}),
            required: true,
        }
    }

    /// A required boolean parameter.
    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: serde_json::json!({"type": "boolean", "description": description.into()}),
            required: true,
        }
    }

    /// Mark this parameter optional (not listed in `required`).
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Fluent builder for constructing a [`FunctionTool`] with automatic JSON
/// schema generation from [`ToolParameter`]s.
pub struct ToolBuilder {
    name: String,
    description: String,
    params: Vec<ToolParameter>,
}

impl ToolBuilder {
    /// Start building a tool with the given name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter to the tool's input schema.
    pub fn param(mut self, param: ToolParameter) -> Self {
        self.params.push(param);
        self
    }

    /// Finish the tool with an async handler, producing a [`ToolResult`]
    /// directly.
    pub fn handler<F, Fut>(self, f: F) -> FunctionTool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            properties.insert(p.name.clone(), p.schema.clone());
            if p.required {
                required.push(p.name.clone());
            }
        }
        FunctionTool {
            name: self.name,
            description: self.description,
            properties,
            required,
            handler: Arc::new(move |input| Box::pin(f(input))),
        }
    }
}

/// Convenience entry point: `tool("name", "description")` starts a [`ToolBuilder`].
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

// ============================================================================
// TOOL REGISTRY
// ============================================================================

/// A name → [`Tool`] mapping with insertion-order iteration for deterministic
/// prompt contents.
///
/// Registering the same name twice replaces the earlier tool but keeps its
/// original position in iteration order, so the definitions sent to the
/// model are unaffected by the common add-then-replace case while still
/// allowing deliberate name reuse.
#[derive(Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry").field("names", &self.order).finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, Arc::new(tool));
    }

    /// Register a tool that's already behind an `Arc`, useful when sharing
    /// one tool instance across multiple registries/contexts.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Register many tools at once, in order.
    pub fn register_many(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register_arc(tool);
        }
    }

    /// Whether a tool with this name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Remove a tool by name. Returns whether a tool was removed. Preserves
    /// the order of remaining tools.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.tools.remove(name).is_some() {
            self.order.retain(|n| n != name);
            true
        } else {
            false
        }
    }

    /// All tools, in insertion order.
    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    /// All tool names, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Wire-form definitions for every tool, in insertion order, ready to
    /// send to the model.
    pub fn definitions(&self) -> Vec<Value> {
        self.all().iter().map(|t| t.definition()).collect()
    }

    /// Resolve `name` and execute it with `input`, returning
    /// `Error("Unknown tool: <name>")` as a [`ToolResult`] on miss.
    pub async fn execute(&self, name: &str, input: Value) -> ToolResult {
        match self.get(name) {
            Some(tool) => tool.execute(input).await,
            None => ToolResult::error(format!("Unknown tool: {name}"), "not_found"),
        }
    }
}

impl Clone for ToolRegistry {
    fn clone(&self) -> Self {
        Self {
            order: self.order.clone(),
            tools: self.tools.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_tool() -> FunctionTool {
        tool("add", "Add two numbers")
            .param(ToolParameter::number("a", "first addend"))
            .param(ToolParameter::number("b", "second addend"))
            .handler(|input| async move {
                let a = input.get("a").and_then(Value::as_f64).unwrap_or(0.0);
                let b = input.get("b").and_then(Value::as_f64).unwrap_or(0.0);
                ToolResult::success((a + b).to_string())
            })
    }

    #[test]
    fn test_empty_required_still_serializes_as_object() {
        let t = tool("ping", "no-arg tool").handler(|_| async { ToolResult::success("pong") });
        let schema = t.input_schema();
        assert!(schema["properties"].is_object());
        assert_eq!(schema["properties"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_function_tool_executes() {
        let t = add_tool();
        let result = t.execute(serde_json::json!({"a": 3, "b": 4})).await;
        assert_eq!(result, ToolResult::Success("7".to_string()));
    }

    #[test]
    fn test_registry_register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(add_tool());
        registry.register(add_tool());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["add".to_string()]);
    }

    #[test]
    fn test_registry_remove_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("a", "").handler(|_| async { ToolResult::success("") }));
        registry.register(tool("b", "").handler(|_| async { ToolResult::success("") }));
        registry.register(tool("c", "").handler(|_| async { ToolResult::success("") }));
        assert!(registry.remove("b"));
        assert_eq!(registry.names(), vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_registry_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nope", serde_json::json!({})).await;
        assert!(result.is_error());
        assert!(result.text().contains("Unknown tool"));
    }

    #[test]
    fn test_registry_definitions_deterministic_order() {
        let mut registry = ToolRegistry::new();
        registry.register(add_tool());
        registry.register(tool("sub", "subtract").handler(|_| async { ToolResult::success("") }));
        let defs = registry.definitions();
        assert_eq!(defs[0]["name"], "add");
        assert_eq!(defs[1]["name"], "sub");
    }
}

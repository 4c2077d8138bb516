//! # Core Type Definitions
//!
//! Messages, content blocks, and agent configuration shared across the single-agent
//! loop and the multi-agent coordinator.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// MESSAGE ROLE
// ============================================================================

/// Role of a message participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human (or calling application) driving the conversation.
    User,
    /// The model.
    Assistant,
    /// A tool_result message sent back to the model on the model's behalf.
    Tool,
}

// ============================================================================
// CONTENT BLOCKS
// ============================================================================

/// A single unit of content inside a [`Message`].
///
/// Messages carry polymorphic content: a plain string, or an ordered list of
/// typed blocks. This enum represents one block in that list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Plain text, generated by the model or supplied by the caller.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool call the model wants executed.
    ToolUse {
        /// Unique id for this call, echoed back in the matching `ToolResult`.
        id: String,
        /// Name of the tool to invoke.
        name: String,
        /// Decoded JSON input for the tool.
        input: serde_json::Value,
    },
    /// The result of executing a tool, sent back to the model.
    ToolResult {
        /// The `id` of the `ToolUse` block this result answers.
        tool_use_id: String,
        /// The text content the model reads.
        content: String,
        /// Whether the tool execution failed.
        is_error: bool,
    },
}

impl Block {
    /// Shorthand for constructing a [`Block::Text`].
    pub fn text(text: impl Into<String>) -> Self {
        Block::Text { text: text.into() }
    }

    /// Shorthand for constructing a [`Block::ToolUse`].
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Block::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Shorthand for constructing a [`Block::ToolResult`].
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Block::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// Returns the tool-use id this block carries, if it's a `ToolUse` block.
    pub fn tool_use_id(&self) -> Option<&str> {
        match self {
            Block::ToolUse { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Returns the tool-result's referenced id, if it's a `ToolResult` block.
    pub fn tool_result_ref(&self) -> Option<&str> {
        match self {
            Block::ToolResult { tool_use_id, .. } => Some(tool_use_id),
            _ => None,
        }
    }
}

/// Polymorphic message content: either a plain string or an ordered list of
/// typed blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain-string content, the common case for user tasks.
    Text(String),
    /// A list of typed content blocks, the common case for assistant turns
    /// that mix text with tool calls, and tool-result turns.
    Blocks(Vec<Block>),
}

impl Content {
    /// All `text` blocks concatenated; for [`Content::Text`] this is the
    /// string itself.
    pub fn concatenated_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    Block::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// All `tool_use` blocks in this content, in order.
    pub fn tool_uses(&self) -> Vec<&Block> {
        match self {
            Content::Text(_) => Vec::new(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter(|b| matches!(b, Block::ToolUse { .. }))
                .collect(),
        }
    }

    /// All `tool_result` blocks in this content, in order.
    pub fn tool_results(&self) -> Vec<&Block> {
        match self {
            Content::Text(_) => Vec::new(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter(|b| matches!(b, Block::ToolResult { .. }))
                .collect(),
        }
    }

    /// Whether this content contains at least one `tool_use` block.
    pub fn has_tool_use(&self) -> bool {
        !self.tool_uses().is_empty()
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<Vec<Block>> for Content {
    fn from(blocks: Vec<Block>) -> Self {
        Content::Blocks(blocks)
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// A single message in a conversation: a role plus its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: MessageRole,
    /// The message content (string or typed blocks).
    pub content: Content,
}

impl Message {
    /// Construct a new message.
    pub fn new(role: MessageRole, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Convenience constructor for an assistant message.
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Whether this message's content contains a dangling `tool_use`: an
    /// assistant message with at least one `tool_use` block. Used by
    /// [`crate::agent_context::AgentContext`] to defer compaction until the
    /// matching `tool_result` is appended.
    pub fn has_dangling_tool_use(&self) -> bool {
        self.role == MessageRole::Assistant && self.content.has_tool_use()
    }
}

// ============================================================================
// TOKEN USAGE
// ============================================================================

/// Accumulated input/output token usage for a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent to the model across all calls in the run.
    pub input: u64,
    /// Tokens generated by the model across all calls in the run.
    pub output: u64,
}

impl TokenUsage {
    /// Total tokens (input + output).
    pub fn total(&self) -> u64 {
        self.input + self.output
    }

    /// Add usage from a single model call onto the running total.
    pub fn add(&mut self, input: u64, output: u64) {
        self.input += input;
        self.output += output;
    }
}

// ============================================================================
// TOOL CALL RECORD
// ============================================================================

/// One entry in an `AgentContext`'s tool-call log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the tool invoked.
    pub tool: String,
    /// Decoded JSON input passed to the tool.
    pub input: serde_json::Value,
    /// The tool's text result (success or error message).
    pub result: String,
    /// Whether the tool execution failed.
    pub is_error: bool,
    /// The loop iteration during which this call happened.
    pub iteration: u32,
    /// Wall-clock time the call was recorded, as milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

// ============================================================================
// EXTENDED THINKING BUDGET
// ============================================================================

/// Optional extended-thinking configuration forwarded to the model transport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThinkingBudget {
    /// Maximum tokens the model may spend on internal reasoning before
    /// producing its visible response.
    pub budget_tokens: u32,
}

// ============================================================================
// AGENT CONFIG
// ============================================================================

/// Immutable configuration for a single agent run.
///
/// Construct via [`AgentConfig::builder`]; `with` returns a modified copy
/// rather than mutating in place, keeping `AgentConfig` itself immutable.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier passed to the transport.
    pub model: String,
    /// Hard cap on ReAct loop iterations.
    pub max_iterations: u32,
    /// Max tokens requested per model response.
    pub max_tokens: u32,
    /// Sampling temperature, if the transport supports it.
    pub temperature: Option<f32>,
    /// Optional extended-thinking budget.
    pub thinking: Option<ThinkingBudget>,
    /// Optional system prompt prepended to every model call.
    pub system_prompt: Option<String>,
}

impl AgentConfig {
    /// Start building a new config. `model` is the only field `build()` requires.
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Returns a copy of this config with `delta` applied.
    ///
    /// `delta` receives a builder pre-populated with this config's current
    /// fields and returns the modified builder; this keeps `AgentConfig`
    /// itself immutable while letting callers derive variants cheaply (e.g.
    /// a lower `max_iterations` for a speculative fork).
    pub fn with(&self, delta: impl FnOnce(AgentConfigBuilder) -> AgentConfigBuilder) -> Result<Self> {
        let builder = AgentConfigBuilder {
            model: Some(self.model.clone()),
            max_iterations: Some(self.max_iterations),
            max_tokens: Some(self.max_tokens),
            temperature: self.temperature,
            thinking: self.thinking,
            system_prompt: self.system_prompt.clone(),
        };
        delta(builder).build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    model: Option<String>,
    max_iterations: Option<u32>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    thinking: Option<ThinkingBudget>,
    system_prompt: Option<String>,
}

impl AgentConfigBuilder {
    /// Set the model identifier (required).
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the max iterations bound. Defaults to 10 if never set.
    pub fn max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Set the max tokens per response. Defaults to 4096 if never set.
    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Set an extended-thinking token budget.
    pub fn thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking = Some(ThinkingBudget { budget_tokens });
        self
    }

    /// Set the system prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Validate and build the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `model` was never set.
    pub fn build(self) -> Result<AgentConfig> {
        let model = self
            .model
            .ok_or_else(|| Error::config("model is required"))?;
        if model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }
        Ok(AgentConfig {
            model,
            max_iterations: self.max_iterations.unwrap_or(10),
            max_tokens: self.max_tokens.unwrap_or(4096),
            temperature: self.temperature,
            thinking: self.thinking,
            system_prompt: self.system_prompt,
        })
    }
}

//! # AgentContext — per-run mutable state
//!
//! Everything the ReAct loop reads and mutates across iterations: the
//! original task, the live tool set, message history, counters, the
//! completion flag, token usage, the tool-call log, free-form metadata,
//! checkpoints, and timing.

use crate::context::ContextManager;
use crate::error::{Error, Result};
use crate::shared_memory::SharedMemory;
use crate::tools::{Tool, ToolRegistry};
use crate::types::{Message, MessageRole, TokenUsage, ToolCallRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A named snapshot of the transferable parts of an [`AgentContext`], used by
/// `create_checkpoint`/`restore_checkpoint` and by the [`crate::agent::Agent`]
/// façade's pause/resume.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    messages: Vec<Message>,
    iteration: u32,
    usage: TokenUsage,
    tool_calls: Vec<ToolCallRecord>,
    metadata: HashMap<String, Value>,
}

/// Outcome of a completed run: either a final answer or an error.
#[derive(Debug, Clone)]
pub enum Completion {
    /// The loop produced a final answer.
    Answer(String),
    /// The loop terminated with an error.
    Error(String),
}

/// Mutable per-run state for a single agent execution.
///
/// Not thread-shared within a single run; [`AgentContext::fork`] produces an
/// independent copy for speculative exploration elsewhere.
pub struct AgentContext {
    /// The original task string the run was given.
    pub task: String,
    tools: ToolRegistry,
    messages: Vec<Message>,
    iteration: u32,
    max_iterations: u32,
    completion: Option<Completion>,
    usage: TokenUsage,
    tool_calls: Vec<ToolCallRecord>,
    metadata: HashMap<String, Value>,
    context_manager: Option<Arc<ContextManager>>,
    memory: Option<Arc<SharedMemory>>,
    checkpoints: HashMap<String, Checkpoint>,
    next_checkpoint_id: u64,
    start_time_ms: i64,
    end_time_ms: Option<i64>,
}

impl AgentContext {
    /// Create a fresh context for `task`, bounded by `max_iterations`.
    pub fn new(task: impl Into<String>, max_iterations: u32, now_ms: i64) -> Self {
        Self {
            task: task.into(),
            tools: ToolRegistry::new(),
            messages: Vec::new(),
            iteration: 0,
            max_iterations,
            completion: None,
            usage: TokenUsage::default(),
            tool_calls: Vec::new(),
            metadata: HashMap::new(),
            context_manager: None,
            memory: None,
            checkpoints: HashMap::new(),
            next_checkpoint_id: 0,
            start_time_ms: now_ms,
            end_time_ms: None,
        }
    }

    /// Attach a context manager used for compaction decisions.
    pub fn with_context_manager(mut self, manager: Arc<ContextManager>) -> Self {
        self.context_manager = Some(manager);
        self
    }

    /// Attach a shared-memory handle. An immutable collaborator: carried
    /// through by reference, not copied, and shared (not duplicated) by
    /// `fork()`.
    pub fn with_memory(mut self, memory: Arc<SharedMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// The shared-memory handle attached to this context, if any. Tool
    /// handlers and loop strategies reach cross-agent facts through this
    /// accessor rather than a dedicated parameter on `Tool::execute`.
    pub fn memory(&self) -> Option<&Arc<SharedMemory>> {
        self.memory.as_ref()
    }

    // ---- tool set ----

    /// Add a tool. No-op if a tool with this name is already registered, so
    /// the model never receives duplicate definitions.
    pub fn add_tool(&mut self, tool: impl Tool + 'static) {
        if !self.tools.has(tool.name()) {
            self.tools.register(tool);
        }
    }

    /// Add a tool already held behind an `Arc`, e.g. one shared across
    /// several agents. No-op if a tool with this name is already registered.
    pub fn add_tool_arc(&mut self, tool: Arc<dyn Tool>) {
        if !self.tools.has(tool.name()) {
            self.tools.register_arc(tool);
        }
    }

    /// Remove a tool by name, preserving the order of the remaining tools.
    pub fn remove_tool(&mut self, name: &str) -> bool {
        self.tools.remove(name)
    }

    /// The tool registry, for lookup during dispatch.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Wire-form tool definitions, in registration order.
    pub fn tool_definitions(&self) -> Vec<Value> {
        self.tools.definitions()
    }

    // ---- messages ----

    /// Append a message to the history. If a context manager is attached and
    /// usage would exceed its `compact_threshold`, compaction runs first —
    /// unless the *current* last message is an assistant message with a
    /// dangling `tool_use` (compaction is deferred until the matching
    /// `tool_result` lands, so the model is never asked to continue a
    /// conversation with an orphaned tool call hanging off the end).
    pub fn add_message(&mut self, message: Message) {
        if let Some(manager) = self.context_manager.clone() {
            let dangling = self
                .messages
                .last()
                .is_some_and(|m| m.has_dangling_tool_use());
            if !dangling {
                let usage = manager.usage_percentage(&self.messages, &self.tools.all());
                if usage > manager.compact_threshold {
                    self.messages = manager.compact_messages(&self.messages, &self.tools.all());
                }
            }
        }
        self.messages.push(message);
    }

    /// The full message history as seen so far (before any compaction that
    /// would apply on the next `add_message`).
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages ready to send to the model, applying compaction now if a
    /// context manager is attached and the history would currently overflow.
    pub fn messages_with_compaction(&self) -> Vec<Message> {
        match &self.context_manager {
            Some(manager) => {
                let dangling = self
                    .messages
                    .last()
                    .is_some_and(|m| m.has_dangling_tool_use());
                if dangling {
                    self.messages.clone()
                } else {
                    manager.compact_messages(&self.messages, &self.tools.all())
                }
            }
            None => self.messages.clone(),
        }
    }

    // ---- iteration / completion ----

    /// Current iteration count.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Hard cap on iterations for this run.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Whether the run has used all its allotted iterations.
    pub fn reached_max_iterations(&self) -> bool {
        self.iteration >= self.max_iterations
    }

    /// Advance the iteration counter by one.
    pub fn increment_iteration(&mut self) {
        self.iteration += 1;
    }

    /// Whether the run has completed (with an answer or an error).
    pub fn completed(&self) -> bool {
        self.completion.is_some()
    }

    /// Mark the run complete with a final answer.
    pub fn complete(&mut self, answer: impl Into<String>, now_ms: i64) {
        self.completion = Some(Completion::Answer(answer.into()));
        self.end_time_ms = Some(now_ms);
    }

    /// Mark the run complete with an error.
    pub fn fail(&mut self, error: impl Into<String>, now_ms: i64) {
        self.completion = Some(Completion::Error(error.into()));
        self.end_time_ms = Some(now_ms);
    }

    /// The run's completion outcome, if any.
    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    // ---- token usage ----

    /// Add token usage from a single model call onto the running total.
    pub fn add_token_usage(&mut self, input: u64, output: u64) {
        self.usage.add(input, output);
    }

    /// Accumulated token usage for the run so far.
    pub fn token_usage(&self) -> TokenUsage {
        self.usage
    }

    // ---- tool-call log ----

    /// Record a completed tool call.
    pub fn record_tool_call(
        &mut self,
        tool: impl Into<String>,
        input: Value,
        result: impl Into<String>,
        is_error: bool,
        now_ms: i64,
    ) {
        self.tool_calls.push(ToolCallRecord {
            tool: tool.into(),
            input,
            result: result.into(),
            is_error,
            iteration: self.iteration,
            timestamp_ms: now_ms,
        });
    }

    /// The full tool-call log, in call order.
    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    // ---- metadata ----

    /// Set a free-form metadata value (used by loop variants to record e.g.
    /// reflection scores).
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Read a metadata value.
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// The full metadata map.
    pub fn metadata_map(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    // ---- timing ----

    /// When the run started, in milliseconds since the Unix epoch.
    pub fn start_time_ms(&self) -> i64 {
        self.start_time_ms
    }

    /// When the run ended, if it has.
    pub fn end_time_ms(&self) -> Option<i64> {
        self.end_time_ms
    }

    // ---- checkpoints ----

    /// Snapshot messages, iteration, usage, tool-call log, and metadata under
    /// `id` (or an auto-generated id if `None`). Returns the id used.
    pub fn create_checkpoint(&mut self, id: Option<String>) -> String {
        let id = id.unwrap_or_else(|| {
            let generated = format!("checkpoint-{}", self.next_checkpoint_id);
            self.next_checkpoint_id += 1;
            generated
        });
        self.checkpoints.insert(
            id.clone(),
            Checkpoint {
                messages: self.messages.clone(),
                iteration: self.iteration,
                usage: self.usage,
                tool_calls: self.tool_calls.clone(),
                metadata: self.metadata.clone(),
            },
        );
        id
    }

    /// Overwrite messages, iteration, usage, tool-call log, and metadata from
    /// the checkpoint named `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no checkpoint with this id exists.
    pub fn restore_checkpoint(&mut self, id: &str) -> Result<()> {
        let checkpoint = self
            .checkpoints
            .get(id)
            .ok_or_else(|| Error::config(format!("no checkpoint named '{id}'")))?
            .clone();
        self.messages = checkpoint.messages;
        self.iteration = checkpoint.iteration;
        self.usage = checkpoint.usage;
        self.tool_calls = checkpoint.tool_calls;
        self.metadata = checkpoint.metadata;
        Ok(())
    }

    // ---- restoring from a persisted snapshot (see crate::agent::Agent::resume) ----

    /// Push a message restored verbatim from a persisted snapshot, bypassing
    /// compaction (the snapshot already reflects whatever compaction ran
    /// before the pause).
    pub fn restore_raw_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Overwrite the iteration counter from a persisted snapshot.
    pub fn restore_raw_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    /// Overwrite the accumulated token usage from a persisted snapshot.
    pub fn restore_raw_usage(&mut self, usage: TokenUsage) {
        self.usage = usage;
    }

    /// Append a tool-call record restored from a persisted snapshot.
    pub fn restore_raw_tool_call(&mut self, record: ToolCallRecord) {
        self.tool_calls.push(record);
    }

    // ---- fork ----

    /// Produce an independent context with a copy of this context's mutable
    /// state (messages, iteration, usage, tool-call log, metadata, tools),
    /// sharing only immutable collaborators passed in by the caller. Intended
    /// for speculative exploration: the parent context is left untouched.
    pub fn fork(&self) -> Self {
        Self {
            task: self.task.clone(),
            tools: self.tools.clone(),
            messages: self.messages.clone(),
            iteration: self.iteration,
            max_iterations: self.max_iterations,
            completion: self.completion.clone(),
            usage: self.usage,
            tool_calls: self.tool_calls.clone(),
            metadata: self.metadata.clone(),
            context_manager: self.context_manager.clone(),
            memory: self.memory.clone(),
            checkpoints: self.checkpoints.clone(),
            next_checkpoint_id: self.next_checkpoint_id,
            start_time_ms: self.start_time_ms,
            end_time_ms: self.end_time_ms,
        }
    }
}

impl Clone for Completion {
    fn clone(&self) -> Self {
        match self {
            Completion::Answer(a) => Completion::Answer(a.clone()),
            Completion::Error(e) => Completion::Error(e.clone()),
        }
    }
}

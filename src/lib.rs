//! # agent-loom
//!
//! A Rust runtime for building tool-using LLM agents and composing them into
//! multi-agent collaborations: a bounded ReAct loop, context-window
//! compaction, retry, checkpointing, and a coordinator for routed, parallel,
//! and debate-style multi-agent execution.
//!
//! ## What this crate is
//!
//! `agent-loom` turns a chat-completion endpoint into a self-directed,
//! tool-using agent. Application code hands the agent a task, the model
//! calls registered tools, the agent observes the results and iterates to an
//! answer — with bounded iteration, context-window management, retry, and
//! checkpointing along the way. Single agents compose into multi-agent
//! systems that route tasks and messages between them.
//!
//! ## Core pieces
//!
//! - [`tools`] — schema-typed callable units, a deterministic registry.
//! - [`agent_context`] — the mutable per-run state: messages, tools,
//!   counters, checkpoints.
//! - [`loop_strategy`] — the default ReAct loop: call model, dispatch tools,
//!   decide.
//! - [`context`] — token estimation and history compaction.
//! - [`retry`] — classified exponential backoff around a fallible operation.
//! - [`agent`] — the façade that wires the above together, plus
//!   pause/resume.
//! - [`message`] — the inter-agent envelope and protocol validation.
//! - [`shared_memory`] — a versioned, in-process key/value store.
//! - [`collaboration`] — turn-taking orchestration across named agents.
//! - [`async_collaboration`] — parallel, batched, and race execution.
//! - [`debate`] — round-based multi-perspective deliberation with a
//!   consensus score.
//!
//! ## Example: a single tool-using agent
//!
//! ```rust,no_run
//! use agent_loom::{Agent, AgentConfig, StubClient};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> agent_loom::Result<()> {
//! let client = Arc::new(StubClient::with_text_reply("4"));
//! let config = AgentConfig::builder().model("demo-model").build()?;
//!
//! let agent = Agent::builder()
//!     .client(client)
//!     .config(config)
//!     .build()?;
//!
//! let result = agent.run("What's 2 + 2?").await;
//! println!("{:?}", result.answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Scope
//!
//! The model transport (the HTTP client to a completion endpoint) and
//! persistence back-ends for built-in tools are external collaborators,
//! specified here only by interface ([`transport::ModelClient`],
//! [`builtin_tools::QueryExecutor`]). This is not a web framework, a general
//! workflow engine, a model trainer, or a persistent scheduler: tasks live
//! only inside a running process, and durability beyond
//! [`agent::Agent::save_state`] is the caller's problem.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
// Dependency order (leaves first): error -> tools -> context -> retry ->
// types -> transport -> shared_memory -> agent_context -> loop_strategy ->
// hooks -> agent -> message -> collaboration -> async_collaboration -> debate.

/// Crate-wide `Error`/`Result`/`ErrorKind` taxonomy.
pub mod error;

/// The `Tool` trait, `ToolBuilder`, `ToolRegistry`, and `ToolResult`.
pub mod tools;

/// Token estimation and context-window compaction.
pub mod context;

/// Classified exponential backoff around a fallible operation.
pub mod retry;

/// Conversation types: `Message`, `Content`, `Block`, `AgentConfig`.
pub mod types;

/// The model-transport interface and the in-memory `StubClient` used by
/// tests.
pub mod transport;

/// A versioned, in-process key/value store shared across agents.
pub mod shared_memory;

/// Per-run mutable agent state: messages, tools, counters, checkpoints.
pub mod agent_context;

/// The `LoopStrategy` trait and the default `ReactLoop` (ReAct) strategy.
pub mod loop_strategy;

/// Lifecycle hooks (`PreToolUse`/`PostToolUse`/`UserPromptSubmit`), a small
/// interception stack generalized to back the ReAct loop's tool dispatch.
pub mod hooks;

/// The `Agent` façade: builder, `run`, pause/resume, save/restore state.
pub mod agent;

/// The multi-agent `Message` envelope and `Protocol` validation.
pub mod message;

/// Turn-taking orchestration across named, registered agents.
pub mod collaboration;

/// Parallel, batched, and race execution over sets of agents.
pub mod async_collaboration;

/// Round-based multi-perspective deliberation with consensus scoring.
pub mod debate;

/// Concrete built-in tools: calculator, datetime, filesystem, database, http.
pub mod builtin_tools;

/// Provider helpers for resolving a model-transport's conventional base URL
/// and default model id.
pub mod config;

/// Internal helpers: id generation, JSON-Schema object construction.
pub mod utils;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

pub use error::{Error, ErrorKind, Result};

pub use tools::{Tool, ToolBuilder, ToolParameter, ToolRegistry, ToolResult, tool};

pub use context::ContextManager;

pub use retry::{RetryConfig, RetryHandler};

pub use types::{
    AgentConfig, AgentConfigBuilder, Block, Content, Message, MessageRole, ThinkingBudget,
    TokenUsage, ToolCallRecord,
};

pub use transport::{CompletionResponse, HttpModelClient, ModelClient, StopReason, StubClient};

pub use agent_context::{AgentContext, Checkpoint, Completion};

pub use loop_strategy::{LoopStrategy, OnError, OnIteration, OnToolExecution, PauseHandle, ReactLoop};

pub use hooks::{
    HOOK_POST_TOOL_USE, HOOK_PRE_TOOL_USE, HOOK_USER_PROMPT_SUBMIT, HookDecision, Hooks,
    PostToolUseEvent, PreToolUseEvent, UserPromptSubmitEvent,
};

pub use agent::{
    Agent, AgentBuilder, AgentResult, PersistedConfig, PersistedContext, PersistedState,
};

pub use shared_memory::{AccessLogEntry, Entry, ExportedState, SharedMemory, Statistics};

pub use collaboration::{
    CollaborationManager, CollaborationResult, CollaborationTurn, CollaborativeAgent,
    DEFAULT_COMPLETION_INDICATORS,
};

pub use async_collaboration::{AsyncCollaborationManager, AsyncOutcome};

pub use debate::{
    DebateAgent, DebateConfig, DebateResult, DebateRound, DebateSystem, ModelDebateAgent,
    Statement,
};

pub use builtin_tools::{
    CalculatorTool, DatabaseTool, DateTimeTool, FilesystemTool, HttpTool, InMemoryExecutor,
    QueryExecutor,
};

pub use config::{Provider, get_base_url, get_model};

/// The multi-agent message envelope (distinct from the conversational
/// [`types::Message`]), re-exported under its own name so both remain
/// reachable without a naming collision.
pub use message::{Message as AgentMessage, Protocol};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The commonly used types and functions for a typical single-agent or
/// multi-agent build. Import with `use agent_loom::prelude::*;`.
pub mod prelude {
    pub use crate::{
        Agent, AgentBuilder, AgentConfig, AgentContext, AgentMessage, AgentResult,
        AsyncCollaborationManager, CollaborationManager, ContextManager, DebateConfig,
        DebateSystem, Error, ModelClient, Protocol, ReactLoop, Result, RetryConfig, RetryHandler,
        SharedMemory, StubClient, Tool, ToolRegistry, ToolResult, tool,
    };
}

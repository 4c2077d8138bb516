//! # Agent façade
//!
//! A builder that wires a model client, tool set, config, optional memory,
//! optional context manager, optional retry config, callbacks, and a loop
//! strategy into a single `run(task)` entry point. Also owns pause/resume:
//! an internal signal set from inside a callback breaks the loop at the next
//! iteration boundary, and `save_state`/`restore_state` (de)serialize the
//! transferable parts of the context.

use crate::agent_context::{AgentContext, Completion};
use crate::error::{Error, Result};
use crate::hooks::{HookDecision, Hooks, UserPromptSubmitEvent};
use crate::loop_strategy::{LoopStrategy, OnError, OnIteration, OnToolExecution, ReactLoop};
use crate::retry::{RetryConfig, RetryHandler};
use crate::shared_memory::SharedMemory;
use crate::tools::Tool;
use crate::transport::ModelClient;
use crate::types::{AgentConfig, TokenUsage, ToolCallRecord};
use log::error;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ============================================================================
// AGENT RESULT
// ============================================================================

/// The outcome of an `Agent::run` call, exposed to callers.
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Whether the run produced an answer rather than failing.
    pub success: bool,
    /// The final answer, if `success`.
    pub answer: Option<String>,
    /// The error message, if not `success`.
    pub error: Option<String>,
    /// Iterations consumed.
    pub iterations: u32,
    /// Accumulated token usage.
    pub token_usage: TokenUsage,
    /// The tool-call log for the run.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Wall-clock duration of the run, in milliseconds.
    pub execution_time_ms: i64,
    /// When the run started, in milliseconds since the Unix epoch.
    pub start_time_ms: i64,
    /// When the run ended, in milliseconds since the Unix epoch.
    pub end_time_ms: i64,
}

impl AgentResult {
    fn from_context(ctx: &AgentContext) -> Self {
        let end = ctx.end_time_ms().unwrap_or_else(now_ms);
        let (success, answer, error) = match ctx.completion() {
            Some(Completion::Answer(text)) => (true, Some(text.clone()), None),
            Some(Completion::Error(message)) => (false, None, Some(message.clone())),
            None => (
                false,
                None,
                Some("run ended without completing (paused or budget exhausted)".to_string()),
            ),
        };
        Self {
            success,
            answer,
            error,
            iterations: ctx.iteration(),
            token_usage: ctx.token_usage(),
            tool_calls: ctx.tool_calls().to_vec(),
            execution_time_ms: end - ctx.start_time_ms(),
            start_time_ms: ctx.start_time_ms(),
            end_time_ms: end,
        }
    }
}

// ============================================================================
// PERSISTED STATE (pause/resume)
// ============================================================================

/// The plain, serializable snapshot of an `Agent`'s paused context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    /// The agent's name, if any.
    pub name: Option<String>,
    /// The paused context's transferable fields.
    pub context: PersistedContext,
    /// The config the run used.
    pub config: PersistedConfig,
    /// When this snapshot was taken, in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// The context half of [`PersistedState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedContext {
    /// The original task string.
    pub task: String,
    /// Message history at the time of pausing.
    pub messages: Vec<crate::types::Message>,
    /// Iterations consumed so far.
    pub iteration: u32,
    /// Whether the run had already completed when paused.
    pub completed: bool,
    /// The final answer, if completed successfully.
    pub answer: Option<String>,
    /// The error, if completed with a failure.
    pub error: Option<String>,
    /// Tool-call log at the time of pausing.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Token usage at the time of pausing.
    pub token_usage: TokenUsage,
    /// Metadata map at the time of pausing.
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
    /// When the run started.
    pub start_time_ms: i64,
    /// When the run ended, if it had.
    pub end_time_ms: Option<i64>,
}

/// The config half of [`PersistedState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedConfig {
    /// Model identifier.
    pub model: String,
    /// Max iterations bound.
    pub max_iterations: u32,
    /// Max tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

// ============================================================================
// AGENT BUILDER + FAÇADE
// ============================================================================

/// Builder for [`Agent`].
pub struct AgentBuilder {
    client: Option<Arc<dyn ModelClient>>,
    config: Option<AgentConfig>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Option<Arc<SharedMemory>>,
    context_manager: Option<Arc<crate::context::ContextManager>>,
    retry_config: Option<RetryConfig>,
    on_iteration: Option<OnIteration>,
    on_tool_execution: Option<OnToolExecution>,
    on_error: Option<OnError>,
    name: Option<String>,
    loop_strategy: Option<Arc<dyn LoopStrategy>>,
    hooks: Option<Hooks>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self {
            client: None,
            config: None,
            tools: Vec::new(),
            memory: None,
            context_manager: None,
            retry_config: None,
            on_iteration: None,
            on_tool_execution: None,
            on_error: None,
            name: None,
            loop_strategy: None,
            hooks: None,
        }
    }
}

impl AgentBuilder {
    /// Set the model transport client (required).
    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the agent's config (required).
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a tool available to this agent.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Register many tools at once.
    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Attach a shared-memory handle for cross-agent facts.
    pub fn memory(mut self, memory: Arc<SharedMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach a context manager for compaction.
    pub fn context_manager(mut self, manager: Arc<crate::context::ContextManager>) -> Self {
        self.context_manager = Some(manager);
        self
    }

    /// Attach a retry config; `run` will wrap the loop in a `RetryHandler`.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// Set the per-iteration callback.
    pub fn on_iteration(mut self, cb: OnIteration) -> Self {
        self.on_iteration = Some(cb);
        self
    }

    /// Set the per-tool-execution callback.
    pub fn on_tool_execution(mut self, cb: OnToolExecution) -> Self {
        self.on_tool_execution = Some(cb);
        self
    }

    /// Set the error callback, invoked once if the run fails.
    pub fn on_error(mut self, cb: OnError) -> Self {
        self.on_error = Some(cb);
        self
    }

    /// Name this agent (used by multi-agent coordination and logging).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the loop strategy (defaults to [`ReactLoop`]).
    pub fn loop_strategy(mut self, strategy: Arc<dyn LoopStrategy>) -> Self {
        self.loop_strategy = Some(strategy);
        self
    }

    /// Attach a lifecycle hook set. `Agent::run` always consults its
    /// `UserPromptSubmit` hooks itself before constructing a context, so
    /// that hook point fires regardless of loop strategy. `PreToolUse`/
    /// `PostToolUse` are instead wired onto the default [`ReactLoop`]
    /// around each tool dispatch; with a custom `loop_strategy` set, wire
    /// those two onto that strategy directly via [`ReactLoop::with_hooks`]
    /// before passing it in.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Validate and build the [`Agent`].
    pub fn build(self) -> Result<Agent> {
        let client = self.client.ok_or_else(|| Error::config("client is required"))?;
        let config = self.config.ok_or_else(|| Error::config("config is required"))?;
        let paused = Arc::new(AtomicBool::new(false));
        let strategy = self.loop_strategy.unwrap_or_else(|| {
            let mut react = ReactLoop::new().with_paused_flag(paused.clone());
            if let Some(cb) = &self.on_iteration {
                react = react.with_on_iteration(cb.clone());
            }
            if let Some(cb) = &self.on_tool_execution {
                react = react.with_on_tool_execution(cb.clone());
            }
            if let Some(hooks) = self.hooks.clone() {
                react = react.with_hooks(hooks);
            }
            Arc::new(react)
        });

        Ok(Agent {
            client,
            config,
            tools: self.tools,
            memory: self.memory,
            context_manager: self.context_manager,
            retry_config: self.retry_config,
            on_error: self.on_error,
            name: self.name,
            strategy,
            paused,
            saved_state: None,
            hooks: self.hooks.unwrap_or_default(),
        })
    }
}

/// The façade over a single agent run: builder-configured, with pause/resume.
pub struct Agent {
    client: Arc<dyn ModelClient>,
    config: AgentConfig,
    tools: Vec<Arc<dyn Tool>>,
    memory: Option<Arc<SharedMemory>>,
    context_manager: Option<Arc<crate::context::ContextManager>>,
    retry_config: Option<RetryConfig>,
    on_error: Option<OnError>,
    name: Option<String>,
    strategy: Arc<dyn LoopStrategy>,
    paused: Arc<AtomicBool>,
    saved_state: Option<PersistedState>,
    hooks: Hooks,
}

impl Agent {
    /// Start building an agent.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    /// This agent's name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The shared-memory handle this agent was built with, if any. Tool
    /// handlers reach it by capturing a clone of this same handle when
    /// they're constructed, since `Tool::execute` itself takes no memory
    /// parameter.
    pub fn memory(&self) -> Option<&Arc<SharedMemory>> {
        self.memory.as_ref()
    }

    /// Signal the agent to pause at the next iteration boundary. Can be
    /// called before `run` (the next run stops before its first model call)
    /// or concurrently from another task holding a clone of this signal;
    /// the default `ReactLoop` checks it at the top of every iteration.
    /// Custom loop strategies that don't opt into the flag ignore it.
    pub fn request_pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn fresh_context(&self, task: &str) -> AgentContext {
        let mut ctx = AgentContext::new(task, self.config.max_iterations, now_ms());
        for tool in &self.tools {
            ctx.add_tool_arc(tool.clone());
        }
        if let Some(manager) = &self.context_manager {
            ctx = ctx.with_context_manager(manager.clone());
        }
        if let Some(memory) = &self.memory {
            ctx = ctx.with_memory(memory.clone());
        }
        ctx
    }

    /// Run `task` to completion (or until paused / the iteration budget is
    /// exhausted). Before the run starts, any registered `UserPromptSubmit`
    /// hooks are consulted: `Block` fails the run without ever constructing
    /// a context or calling the model, `ModifyPrompt` substitutes the task
    /// text. On unhandled error, invokes the error callback and returns an
    /// `AgentResult` with `success: false`.
    pub async fn run(&mut self, task: impl Into<String>) -> AgentResult {
        let task = task.into();
        let event = UserPromptSubmitEvent { prompt: task.clone(), history: Vec::new() };
        let task = match self.hooks.run_user_prompt_submit(&event) {
            HookDecision::Block(reason) => {
                let mut ctx = self.fresh_context(&task);
                ctx.fail(reason, now_ms());
                return AgentResult::from_context(&ctx);
            }
            HookDecision::ModifyPrompt(new_task) => new_task,
            _ => task,
        };
        let mut ctx = self.fresh_context(&task);
        ctx.add_message(crate::types::Message::user(task.clone()));
        self.run_context(ctx).await
    }

    /// Resume a paused run from the last saved context.
    pub async fn resume(&mut self) -> Result<AgentResult> {
        let state = self
            .saved_state
            .take()
            .ok_or_else(|| Error::config("no paused state to resume"))?;
        let ctx = self.context_from_persisted(state);
        Ok(self.run_context(ctx).await)
    }

    async fn run_context(&mut self, mut ctx: AgentContext) -> AgentResult {
        let run_result = if let Some(retry_config) = self.retry_config {
            let handler = RetryHandler::new(retry_config);
            let client = self.client.clone();
            let config = self.config.clone();
            let strategy = self.strategy.clone();
            let ctx_ref = &mut ctx;
            // Each retry attempt reborrows the same context, so a transient
            // model-call failure resumes the run rather than restarting it.
            handler
                .run(|| strategy.execute(&mut *ctx_ref, client.as_ref(), &config))
                .await
        } else {
            self.strategy.execute(&mut ctx, self.client.as_ref(), &self.config).await
        };

        if let Err(err) = &run_result {
            ctx.fail(err.to_string(), now_ms());
            if let Some(cb) = &self.on_error {
                cb(err);
            } else {
                error!("agent run failed: {err}");
            }
        }

        // A pause mid-run leaves the context incomplete; the loop strategy
        // breaks without calling `ctx.complete`/`ctx.fail`. Consume the
        // signal here so the *next* run (a fresh task, not a resume) starts
        // unpaused.
        if !ctx.completed() && self.paused.load(Ordering::SeqCst) {
            self.saved_state = Some(self.persist(&ctx));
            self.paused.store(false, Ordering::SeqCst);
        } else if !ctx.completed() {
            // Not paused and not completed means the loop exited immediately
            // because max_iterations was already reached (e.g. 0) before any
            // model call — a Budget failure, not a silent no-op.
            let err = Error::budget(format!(
                "reached max_iterations ({}) before the loop could run",
                ctx.max_iterations()
            ));
            ctx.fail(err.to_string(), now_ms());
        }

        AgentResult::from_context(&ctx)
    }

    /// Serialize the transferable parts of `ctx` into [`PersistedState`].
    fn persist(&self, ctx: &AgentContext) -> PersistedState {
        let (completed, answer, error) = match ctx.completion() {
            Some(Completion::Answer(text)) => (true, Some(text.clone()), None),
            Some(Completion::Error(message)) => (true, None, Some(message.clone())),
            None => (false, None, None),
        };
        PersistedState {
            name: self.name.clone(),
            context: PersistedContext {
                task: ctx.task.clone(),
                messages: ctx.messages().to_vec(),
                iteration: ctx.iteration(),
                completed,
                answer,
                error,
                tool_calls: ctx.tool_calls().to_vec(),
                token_usage: ctx.token_usage(),
                metadata: ctx.metadata_map().clone(),
                start_time_ms: ctx.start_time_ms(),
                end_time_ms: ctx.end_time_ms(),
            },
            config: PersistedConfig {
                model: self.config.model.clone(),
                max_iterations: self.config.max_iterations,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
            timestamp_ms: now_ms(),
        }
    }

    /// Snapshot the agent's current paused state for external storage.
    /// Returns `None` if the agent was never paused.
    pub fn save_state(&self) -> Option<&PersistedState> {
        self.saved_state.as_ref()
    }

    /// Restore a previously saved state, making it resumable via [`Agent::resume`].
    pub fn restore_state(&mut self, state: PersistedState) {
        self.saved_state = Some(state);
    }

    fn context_from_persisted(&self, state: PersistedState) -> AgentContext {
        let mut ctx = self.fresh_context(&state.context.task);
        for message in state.context.messages {
            ctx.restore_raw_message(message);
        }
        ctx.restore_raw_iteration(state.context.iteration);
        ctx.restore_raw_usage(state.context.token_usage);
        for record in state.context.tool_calls {
            ctx.restore_raw_tool_call(record);
        }
        for (key, value) in state.context.metadata {
            ctx.set_metadata(key, value);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{CompletionResponse, StopReason, StubClient};
    use crate::types::{Block, TokenUsage};

    fn text_response(text: &str) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content_blocks: vec![Block::text(text)],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage { input: 10, output: 5 },
        })
    }

    fn tool_use_response(id: &str, name: &str, input: serde_json::Value) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content_blocks: vec![Block::tool_use(id, name, input)],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage { input: 10, output: 5 },
        })
    }

    fn noop_tool() -> Arc<dyn Tool> {
        Arc::new(
            crate::tools::tool("noop", "does nothing")
                .handler(|_| async { crate::tools::ToolResult::success("ok") }),
        )
    }

    #[tokio::test]
    async fn test_user_prompt_submit_hook_can_block_before_any_model_call() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("unused")]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let mut hooks = Hooks::new();
        hooks.on_user_prompt_submit(|_event| HookDecision::Block("prompt rejected".to_string()));
        let mut agent = Agent::builder().client(client.clone()).config(config).hooks(hooks).build().unwrap();

        let result = agent.run("do something forbidden").await;

        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "prompt rejected");
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_user_prompt_submit_hook_can_rewrite_task() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("42")]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let mut hooks = Hooks::new();
        hooks.on_user_prompt_submit(|_event| HookDecision::ModifyPrompt("rewritten task".to_string()));
        let mut agent = Agent::builder().client(client).config(config).hooks(hooks).build().unwrap();

        let result = agent.run("original task").await;

        assert!(result.success);
        assert_eq!(result.answer.unwrap(), "42");
    }

    #[tokio::test]
    async fn test_memory_handle_reaches_agent_and_tool_handlers() {
        let memory = Arc::new(crate::shared_memory::SharedMemory::new());
        memory
            .write("seen_by_tool", serde_json::json!(false), "test", None, 0)
            .await;

        let writer = memory.clone();
        let flag_tool: Arc<dyn Tool> = Arc::new(
            crate::tools::tool("flip_flag", "flips a flag in shared memory").handler(
                move |_input| {
                    let writer = writer.clone();
                    async move {
                        writer
                            .write("seen_by_tool", serde_json::json!(true), "tool", None, 1)
                            .await;
                        crate::tools::ToolResult::success("ok")
                    }
                },
            ),
        );

        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![
            tool_use_response("1", "flip_flag", serde_json::json!({})),
            text_response("done"),
        ]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let mut agent = Agent::builder()
            .client(client)
            .config(config)
            .tool(flag_tool)
            .memory(memory.clone())
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(agent.memory().unwrap(), &memory));

        let result = agent.run("flip the flag").await;
        assert!(result.success);

        let flag = memory.read("seen_by_tool", "test", None, 2).await;
        assert_eq!(flag, Some(serde_json::json!(true)));
    }

    #[tokio::test]
    async fn test_successful_run_returns_answer() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("42")]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let mut agent = Agent::builder().client(client).config(config).build().unwrap();

        let result = agent.run("what is the answer?").await;
        assert!(result.success);
        assert_eq!(result.answer.unwrap(), "42");
        assert_eq!(result.iterations, 0);
    }

    #[tokio::test]
    async fn test_zero_max_iterations_is_budget_failure() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("unused")]));
        let config = AgentConfig::builder().model("test").max_iterations(0).build().unwrap();
        let mut agent = Agent::builder().client(client).config(config).build().unwrap();

        let result = agent.run("task").await;
        assert!(!result.success);
        assert_eq!(result.iterations, 0);
        assert!(result.error.unwrap().contains("Budget"));
    }

    #[tokio::test]
    async fn test_retry_wraps_transport_failures() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![
            Err(Error::rate_limit("slow down")),
            text_response("recovered"),
        ]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let retry_config = RetryConfig::new(3, 1, 5, 2.0).unwrap();
        let mut agent = Agent::builder()
            .client(client)
            .config(config)
            .retry_config(retry_config)
            .build()
            .unwrap();

        let result = agent.run("task").await;
        assert!(result.success);
        assert_eq!(result.answer.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_save_and_restore_state_round_trip() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("ok")]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let mut agent = Agent::builder().client(client).config(config).build().unwrap();

        agent.request_pause();
        let _ = agent.run("task").await;
        let state = agent.save_state().cloned();
        assert!(state.is_some());

        let client2: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("continued")]));
        let config2 = AgentConfig::builder().model("test").build().unwrap();
        let mut agent2 = Agent::builder().client(client2).config(config2).build().unwrap();
        agent2.restore_state(state.unwrap());
        let resumed = agent2.resume().await.unwrap();
        assert!(resumed.success);
    }

    #[tokio::test]
    async fn test_callback_can_request_pause_mid_run() {
        // Model asks for a tool on the first call; if the run weren't paused
        // it would call the model a second time and complete with "done".
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![
            tool_use_response("call_1", "noop", serde_json::json!({})),
            text_response("done"),
        ]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let on_iteration: OnIteration = Arc::new(|_ctx, _stop_reason, pause| {
            pause.request();
        });
        let mut agent = Agent::builder()
            .client(client)
            .config(config)
            .tool(noop_tool())
            .on_iteration(on_iteration)
            .build()
            .unwrap();

        let result = agent.run("task").await;

        assert!(!result.success);
        assert_eq!(result.tool_calls.len(), 1, "tool dispatch for the first call still ran");
        let saved = agent.save_state();
        assert!(saved.is_some(), "pausing from inside the callback left a resumable state");
    }
}

//! # LoopStrategy — the iterated think/act/observe algorithm
//!
//! The default strategy, `ReactLoop`, implements the canonical tool-using
//! ReAct loop: call the model, dispatch any requested tools, feed results
//! back, repeat until the model stops asking for tools or the iteration
//! budget is exhausted.

use crate::agent_context::AgentContext;
use crate::error::Result;
use crate::hooks::{HookDecision, Hooks, PostToolUseEvent, PreToolUseEvent};
use crate::transport::{ModelClient, StopReason};
use crate::types::{AgentConfig, Block, Message, MessageRole};
use async_trait::async_trait;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A handle callbacks use to request that the loop pause at the top of its
/// next iteration. Cloning shares the same underlying signal: the handle
/// passed into a callback is the same flag [`crate::agent::Agent::request_pause`]
/// sets from outside the run.
#[derive(Clone)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    /// Wrap a shared pause flag.
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    /// Request that the loop break out at the top of its next iteration.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a pause has been requested but not yet observed by the loop.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Called after each model round-trip, with the context as it stands, the
/// stop reason the model returned, and a handle to request a pause.
pub type OnIteration = Arc<dyn Fn(&AgentContext, StopReason, &PauseHandle) + Send + Sync>;
/// Called after each tool execution, with the tool name, its input, whether
/// it errored, and a handle to request a pause.
pub type OnToolExecution = Arc<dyn Fn(&str, &serde_json::Value, bool, &PauseHandle) + Send + Sync>;
/// Called once if the run ends in an error.
pub type OnError = Arc<dyn Fn(&crate::error::Error) + Send + Sync>;

/// A function returning the current time in milliseconds since the Unix
/// epoch, injected so the loop never calls a wall-clock primitive directly
/// (keeps it trivially testable and deterministic).
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// The algorithm driving iteration between model calls and tool dispatch.
#[async_trait]
pub trait LoopStrategy: Send + Sync {
    /// Drive `ctx` to completion against `client`/`config`, honoring
    /// `ctx.max_iterations()`.
    async fn execute(
        &self,
        ctx: &mut AgentContext,
        client: &dyn ModelClient,
        config: &AgentConfig,
    ) -> Result<()>;
}

/// The default ReAct loop strategy: think (model call) → act (tool dispatch)
/// → observe (tool results fed back) → repeat.
pub struct ReactLoop {
    on_iteration: Option<OnIteration>,
    on_tool_execution: Option<OnToolExecution>,
    hooks: Hooks,
    clock: Clock,
    paused: Arc<AtomicBool>,
}

impl ReactLoop {
    /// Build a loop with no callbacks, its own unshared pause flag, and the
    /// system clock.
    pub fn new() -> Self {
        Self {
            on_iteration: None,
            on_tool_execution: None,
            hooks: Hooks::new(),
            clock: Arc::new(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0)
            }),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach a shared pause signal, checked at the top of every iteration
    /// (alongside `completed`/`reached_max_iterations`) and handed to
    /// `on_iteration`/`on_tool_execution` callbacks as a [`PauseHandle`] so a
    /// callback can request the pause itself, not only a caller outside the
    /// run (e.g. [`crate::agent::Agent::request_pause`]). Once observed, the
    /// loop breaks without marking the context complete, leaving it
    /// resumable.
    pub fn with_paused_flag(mut self, paused: Arc<AtomicBool>) -> Self {
        self.paused = paused;
        self
    }

    /// Override the clock (used by tests for deterministic timestamps).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Set the per-iteration callback.
    pub fn with_on_iteration(mut self, cb: OnIteration) -> Self {
        self.on_iteration = Some(cb);
        self
    }

    /// Set the per-tool-execution callback.
    pub fn with_on_tool_execution(mut self, cb: OnToolExecution) -> Self {
        self.on_tool_execution = Some(cb);
        self
    }

    /// Set the lifecycle hook set consulted around tool dispatch.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }
}

impl Default for ReactLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoopStrategy for ReactLoop {
    async fn execute(
        &self,
        ctx: &mut AgentContext,
        client: &dyn ModelClient,
        config: &AgentConfig,
    ) -> Result<()> {
        loop {
            if ctx.completed() || ctx.reached_max_iterations() {
                break;
            }

            if self.paused.load(Ordering::SeqCst) {
                debug!("ReactLoop: pause signal observed, breaking without completing");
                break;
            }

            let messages = ctx.messages_with_compaction();
            let tool_defs = ctx.tool_definitions();
            debug!(
                "ReactLoop: iteration {} — calling model with {} messages, {} tools",
                ctx.iteration(),
                messages.len(),
                tool_defs.len()
            );

            let response = client.complete(config, &messages, &tool_defs).await?;
            ctx.add_token_usage(response.usage.input, response.usage.output);
            ctx.add_message(Message::new(
                MessageRole::Assistant,
                response.content_blocks.clone(),
            ));

            if let Some(cb) = &self.on_iteration {
                cb(ctx, response.stop_reason, &PauseHandle::new(self.paused.clone()));
            }

            if response.stop_reason != StopReason::ToolUse {
                let answer = response.concatenated_text();
                info!("ReactLoop: stop_reason={:?}, completing with answer", response.stop_reason);
                ctx.complete(answer, (self.clock)());
                break;
            }

            // The model asked for tool_use; if honoring the call would push
            // us past max_iterations, terminate now with a note instead of
            // dispatching tools the caller will never see resolved.
            if ctx.iteration() + 1 >= ctx.max_iterations() {
                let note = format!(
                    "Reached max_iterations ({}) while the model still requested tool use.",
                    ctx.max_iterations()
                );
                info!("ReactLoop: {note}");
                ctx.complete(note, (self.clock)());
                break;
            }

            let mut tool_results = Vec::new();
            for block in &response.content_blocks {
                if let Block::ToolUse { id, name, input } = block {
                    let history = ctx.messages().to_vec();
                    let pre_event = PreToolUseEvent {
                        tool_name: name.clone(),
                        input: input.clone(),
                        tool_use_id: id.clone(),
                        history,
                    };
                    let (effective_input, blocked) = match self.hooks.run_pre_tool_use(&pre_event) {
                        HookDecision::Block(reason) => (input.clone(), Some(reason)),
                        HookDecision::ModifyInput(new_input) => (new_input, None),
                        _ => (input.clone(), None),
                    };

                    let (result_text, is_error) = if let Some(reason) = blocked {
                        (reason, true)
                    } else {
                        let result = ctx.tools().execute(name, effective_input.clone()).await;
                        let post_event = PostToolUseEvent {
                            tool_name: name.clone(),
                            input: effective_input.clone(),
                            tool_use_id: id.clone(),
                            result: result.clone(),
                            history: ctx.messages().to_vec(),
                        };
                        match self.hooks.run_post_tool_use(&post_event) {
                            HookDecision::Block(reason) => (reason, true),
                            _ => (result.text().to_string(), result.is_error()),
                        }
                    };

                    ctx.record_tool_call(
                        name.clone(),
                        effective_input.clone(),
                        result_text.clone(),
                        is_error,
                        (self.clock)(),
                    );
                    if let Some(cb) = &self.on_tool_execution {
                        cb(name, &effective_input, is_error, &PauseHandle::new(self.paused.clone()));
                    }
                    tool_results.push(Block::tool_result(id.clone(), result_text, is_error));
                }
            }

            ctx.add_message(Message::new(MessageRole::User, tool_results));
            ctx.increment_iteration();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{tool, ToolResult};
    use crate::transport::{CompletionResponse, StubClient};
    use crate::types::TokenUsage;

    fn add_tool() -> crate::tools::FunctionTool {
        tool("add", "add two numbers")
            .param(crate::tools::ToolParameter::number("a", "a"))
            .param(crate::tools::ToolParameter::number("b", "b"))
            .handler(|input| async move {
                let a = input["a"].as_f64().unwrap_or(0.0);
                let b = input["b"].as_f64().unwrap_or(0.0);
                ToolResult::success((a + b).to_string())
            })
    }

    fn tool_use_response(id: &str, name: &str, input: serde_json::Value) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content_blocks: vec![Block::tool_use(id, name, input)],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage { input: 10, output: 5 },
        })
    }

    fn text_response(text: &str) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content_blocks: vec![Block::text(text)],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage { input: 10, output: 5 },
        })
    }

    #[tokio::test]
    async fn test_two_step_arithmetic() {
        let client = StubClient::new(vec![
            tool_use_response("1", "add", serde_json::json!({"a": 3, "b": 4})),
            tool_use_response("2", "add", serde_json::json!({"a": 7, "b": 5})),
            text_response("The answer is 12"),
        ]);
        let config = AgentConfig::builder().model("test").max_iterations(5).build().unwrap();
        let mut ctx = AgentContext::new("Compute (3+4)+5", 5, 0);
        ctx.add_tool(add_tool());
        ctx.add_message(Message::user(ctx.task.clone()));

        let strategy = ReactLoop::new();
        strategy.execute(&mut ctx, &client, &config).await.unwrap();

        assert_eq!(ctx.iteration(), 2);
        match ctx.completion().unwrap() {
            crate::agent_context::Completion::Answer(text) => assert!(text.contains("12")),
            other => panic!("expected Answer, got {other:?}"),
        }
        assert!(ctx.token_usage().total() > 0);
        assert_eq!(ctx.tool_calls().len(), 2);
        assert_eq!(ctx.tool_calls()[0].result, "7");
        assert_eq!(ctx.tool_calls()[1].result, "12");
    }

    #[tokio::test]
    async fn test_unknown_tool_recorded_as_error_and_loop_continues() {
        let client = StubClient::new(vec![
            tool_use_response("1", "nope", serde_json::json!({})),
            text_response("done"),
        ]);
        let config = AgentConfig::builder().model("test").max_iterations(5).build().unwrap();
        let mut ctx = AgentContext::new("task", 5, 0);
        ctx.add_tool(tool("calc", "calc").handler(|_| async { ToolResult::success("42") }));
        ctx.add_message(Message::user("task"));

        let strategy = ReactLoop::new();
        strategy.execute(&mut ctx, &client, &config).await.unwrap();

        assert_eq!(ctx.tool_calls().len(), 1);
        assert!(ctx.tool_calls()[0].is_error);
        assert!(ctx.tool_calls()[0].result.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_budget_terminates_before_tool_dispatch_when_limit_reached() {
        let client = StubClient::new(vec![tool_use_response("1", "add", serde_json::json!({"a": 1, "b": 2}))]);
        let config = AgentConfig::builder().model("test").max_iterations(1).build().unwrap();
        let mut ctx = AgentContext::new("task", 1, 0);
        ctx.add_tool(add_tool());
        ctx.add_message(Message::user("task"));

        let strategy = ReactLoop::new();
        strategy.execute(&mut ctx, &client, &config).await.unwrap();

        assert!(ctx.completed());
        assert_eq!(ctx.tool_calls().len(), 0);
        match ctx.completion().unwrap() {
            crate::agent_context::Completion::Answer(text) => assert!(text.contains("max_iterations")),
            other => panic!("expected Answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_max_iterations_zero_never_calls_model() {
        let client = StubClient::new(vec![text_response("unused")]);
        let config = AgentConfig::builder().model("test").max_iterations(0).build().unwrap();
        let mut ctx = AgentContext::new("task", 0, 0);
        ctx.add_message(Message::user("task"));

        let strategy = ReactLoop::new();
        strategy.execute(&mut ctx, &client, &config).await.unwrap();

        assert_eq!(ctx.iteration(), 0);
        assert_eq!(client.call_count(), 0);
        assert!(!ctx.completed());
    }
}

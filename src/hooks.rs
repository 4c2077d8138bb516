//! # Lifecycle Hooks
//!
//! Carried forward from the ambient stack: a small interception system for
//! security gates, audit logging, and input/output modification around tool
//! dispatch. Hooks are executed sequentially; the first non-`None` decision
//! takes effect.
//!
//! These hook points (`PreToolUse`, `PostToolUse`, `UserPromptSubmit`) sit
//! alongside the ReAct loop's `on_iteration`/`on_tool_execution` callbacks:
//! a callback that returns `HookDecision::Block` surfaces as a `Tool`-kind
//! error result for that call, exactly like a handler throwing.

use crate::tools::ToolResult;
use crate::types::Message;
use serde_json::Value;
use std::sync::Arc;

/// Identifier for the pre-tool-execution hook point.
pub const HOOK_PRE_TOOL_USE: &str = "PreToolUse";
/// Identifier for the post-tool-execution hook point.
pub const HOOK_POST_TOOL_USE: &str = "PostToolUse";
/// Identifier for the hook point fired before a task/prompt is sent.
pub const HOOK_USER_PROMPT_SUBMIT: &str = "UserPromptSubmit";

/// Decision returned by a hook to control execution flow.
#[derive(Debug, Clone)]
pub enum HookDecision {
    /// Proceed unmodified.
    Continue,
    /// Block execution with a reason surfaced to the caller.
    Block(String),
    /// Proceed, but with the tool input replaced.
    ModifyInput(Value),
    /// Proceed, but with the prompt replaced.
    ModifyPrompt(String),
}

/// Event data passed to `PreToolUse` hooks before a tool is executed.
#[derive(Debug, Clone)]
pub struct PreToolUseEvent {
    /// Name of the tool about to be invoked.
    pub tool_name: String,
    /// Decoded JSON input about to be passed to the tool.
    pub input: Value,
    /// The `tool_use` block id this call answers.
    pub tool_use_id: String,
    /// Full conversation history so far.
    pub history: Vec<Message>,
}

/// Event data passed to `PostToolUse` hooks after a tool has executed.
#[derive(Debug, Clone)]
pub struct PostToolUseEvent {
    /// Name of the tool that was invoked.
    pub tool_name: String,
    /// Decoded JSON input that was passed to the tool.
    pub input: Value,
    /// The `tool_use` block id this call answered.
    pub tool_use_id: String,
    /// The tool's result.
    pub result: ToolResult,
    /// Full conversation history so far.
    pub history: Vec<Message>,
}

/// Event data passed to `UserPromptSubmit` hooks before a task is sent.
#[derive(Debug, Clone)]
pub struct UserPromptSubmitEvent {
    /// The task/prompt about to be submitted.
    pub prompt: String,
    /// Full conversation history so far.
    pub history: Vec<Message>,
}

type PreToolHook = Arc<dyn Fn(&PreToolUseEvent) -> HookDecision + Send + Sync>;
type PostToolHook = Arc<dyn Fn(&PostToolUseEvent) -> HookDecision + Send + Sync>;
type PromptHook = Arc<dyn Fn(&UserPromptSubmitEvent) -> HookDecision + Send + Sync>;

/// Container for registering and running lifecycle hooks. Hooks at each point
/// run in registration order; the first decision that isn't `Continue` wins.
#[derive(Clone, Default)]
pub struct Hooks {
    pre_tool_use: Vec<PreToolHook>,
    post_tool_use: Vec<PostToolHook>,
    user_prompt_submit: Vec<PromptHook>,
}

impl Hooks {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `PreToolUse` hook.
    pub fn on_pre_tool_use(
        &mut self,
        hook: impl Fn(&PreToolUseEvent) -> HookDecision + Send + Sync + 'static,
    ) {
        self.pre_tool_use.push(Arc::new(hook));
    }

    /// Register a `PostToolUse` hook.
    pub fn on_post_tool_use(
        &mut self,
        hook: impl Fn(&PostToolUseEvent) -> HookDecision + Send + Sync + 'static,
    ) {
        self.post_tool_use.push(Arc::new(hook));
    }

    /// Register a `UserPromptSubmit` hook.
    pub fn on_user_prompt_submit(
        &mut self,
        hook: impl Fn(&UserPromptSubmitEvent) -> HookDecision + Send + Sync + 'static,
    ) {
        self.user_prompt_submit.push(Arc::new(hook));
    }

    /// Run all `PreToolUse` hooks; returns the first non-`Continue` decision.
    pub fn run_pre_tool_use(&self, event: &PreToolUseEvent) -> HookDecision {
        for hook in &self.pre_tool_use {
            match hook(event) {
                HookDecision::Continue => continue,
                other => return other,
            }
        }
        HookDecision::Continue
    }

    /// Run all `PostToolUse` hooks; returns the first non-`Continue` decision.
    pub fn run_post_tool_use(&self, event: &PostToolUseEvent) -> HookDecision {
        for hook in &self.post_tool_use {
            match hook(event) {
                HookDecision::Continue => continue,
                other => return other,
            }
        }
        HookDecision::Continue
    }

    /// Run all `UserPromptSubmit` hooks; returns the first non-`Continue` decision.
    pub fn run_user_prompt_submit(&self, event: &UserPromptSubmitEvent) -> HookDecision {
        for hook in &self.user_prompt_submit {
            match hook(event) {
                HookDecision::Continue => continue,
                other => return other,
            }
        }
        HookDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_continue_decision_wins() {
        let mut hooks = Hooks::new();
        hooks.on_pre_tool_use(|_| HookDecision::Continue);
        hooks.on_pre_tool_use(|_| HookDecision::Block("nope".to_string()));
        hooks.on_pre_tool_use(|_| HookDecision::Block("never reached".to_string()));

        let event = PreToolUseEvent {
            tool_name: "t".to_string(),
            input: serde_json::json!({}),
            tool_use_id: "1".to_string(),
            history: vec![],
        };

        match hooks.run_pre_tool_use(&event) {
            HookDecision::Block(reason) => assert_eq!(reason, "nope"),
            other => panic!("expected Block, got {other:?}"),
        }
    }

    #[test]
    fn test_no_hooks_registered_continues() {
        let hooks = Hooks::new();
        let event = PreToolUseEvent {
            tool_name: "t".to_string(),
            input: serde_json::json!({}),
            tool_use_id: "1".to_string(),
            history: vec![],
        };
        assert!(matches!(hooks.run_pre_tool_use(&event), HookDecision::Continue));
    }
}

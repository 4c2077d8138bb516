//! # Context Window Management
//!
//! `ContextManager` bounds prompt size: it estimates token usage for a
//! message history plus tool definitions, and compacts history that would
//! overflow the model's context window while preserving the invariants the
//! ReAct loop depends on (initial task kept, no orphan tool_use/tool_result
//! pairs, a recent tail kept intact).

use crate::tools::Tool;
use crate::types::{Content, Message};
use log::warn;
use std::sync::Arc;

/// Default fraction of the context window at which
/// [`crate::agent_context::AgentContext::add_message`] auto-triggers
/// compaction, leaving headroom for one more tool_use/tool_result round
/// before the window is actually exceeded.
pub const DEFAULT_COMPACT_THRESHOLD: f64 = 0.8;

/// Characters per estimated token, a rough heuristic (not exact, only
/// monotonic with content volume).
const CHARS_PER_TOKEN: f64 = 4.0;

/// Bounds a conversation's size against a model's context window.
#[derive(Debug, Clone)]
pub struct ContextManager {
    /// Total context window, in tokens, the target model supports.
    pub max_context_tokens: u64,
    /// Fraction of `max_context_tokens` compaction aims to fall under.
    pub target_fraction: f64,
    /// Fraction of `max_context_tokens` at which `add_message` auto-compacts.
    pub compact_threshold: f64,
}

impl ContextManager {
    /// Build a manager for a model with the given context window, using the
    /// default compaction target (80% of the window) and trigger threshold.
    pub fn new(max_context_tokens: u64) -> Self {
        Self {
            max_context_tokens,
            target_fraction: DEFAULT_COMPACT_THRESHOLD,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }

    /// Override the compaction target fraction.
    pub fn with_target_fraction(mut self, fraction: f64) -> Self {
        self.target_fraction = fraction;
        self
    }

    /// Override the auto-compact trigger threshold.
    pub fn with_compact_threshold(mut self, fraction: f64) -> Self {
        self.compact_threshold = fraction;
        self
    }

    /// Approximate the token count of a message history plus tool
    /// definitions. Character-count based; not exact, only monotonic with
    /// content volume.
    pub fn estimate_tokens(&self, messages: &[Message], tools: &[Arc<dyn Tool>]) -> u64 {
        let message_chars: usize = messages
            .iter()
            .map(|m| match &m.content {
                Content::Text(s) => s.len(),
                Content::Blocks(blocks) => blocks
                    .iter()
                    .map(|b| serde_json::to_string(b).map(|s| s.len()).unwrap_or(0))
                    .sum(),
            })
            .sum();
        let tool_chars: usize = tools
            .iter()
            .map(|t| serde_json::to_string(&t.definition()).map(|s| s.len()).unwrap_or(0))
            .sum();
        ((message_chars + tool_chars) as f64 / CHARS_PER_TOKEN).ceil() as u64
    }

    /// Fraction of the context window `messages`+`tools` would occupy.
    pub fn usage_percentage(&self, messages: &[Message], tools: &[Arc<dyn Tool>]) -> f64 {
        if self.max_context_tokens == 0 {
            return f64::INFINITY;
        }
        self.estimate_tokens(messages, tools) as f64 / self.max_context_tokens as f64
    }

    /// Whether `messages`+`tools` fit within the context window.
    pub fn fits_in_context(&self, messages: &[Message], tools: &[Arc<dyn Tool>]) -> bool {
        self.usage_percentage(messages, tools) <= 1.0
    }

    /// Compact `messages` to fit under `target_fraction` of the window,
    /// preserving:
    ///
    /// 1. the initial user task (first message),
    /// 2. a tail of the most recent messages, cut only on tool_use/tool_result
    ///    pair boundaries,
    /// 3. never leaving an orphaned `tool_use` or `tool_result`,
    /// 4. optionally a synthesized summary of the dropped middle.
    ///
    /// If the only way to hit the target would require dropping the initial
    /// task, the task is kept and the smallest achievable superset is
    /// returned with a warning logged (never silently failing).
    pub fn compact_messages(&self, messages: &[Message], tools: &[Arc<dyn Tool>]) -> Vec<Message> {
        if messages.is_empty() {
            return Vec::new();
        }

        let target_tokens = (self.max_context_tokens as f64 * self.target_fraction) as u64;
        if self.estimate_tokens(messages, tools) <= target_tokens {
            return messages.to_vec();
        }

        let first = messages[0].clone();
        let rest = &messages[1..];

        // Grow the kept tail from the back until either the target is met or
        // we've consumed the whole remaining history, cutting only on pair
        // boundaries (never start the tail in the middle of a tool_use /
        // tool_result exchange).
        let mut kept_from = rest.len();
        let mut best = vec![first.clone()];

        loop {
            if kept_from == 0 {
                break;
            }
            kept_from -= 1;
            if !Self::is_pair_boundary(rest, kept_from) {
                continue;
            }
            let mut candidate = vec![first.clone()];
            candidate.extend_from_slice(&rest[kept_from..]);
            let fits = self.estimate_tokens(&candidate, tools) <= target_tokens;
            best = candidate;
            if fits {
                break;
            }
        }

        if best.len() == messages.len() {
            warn!(
                "ContextManager: could not compact below target ({} tokens); keeping the initial \
                 task and the smallest achievable superset",
                target_tokens
            );
        }

        best
    }

    /// Whether index `idx` in `rest` is a valid start for the kept tail: it
    /// must not begin in the middle of a dangling tool_use/tool_result
    /// exchange (an assistant tool_use whose matching tool_result message
    /// would be dropped, or a tool_result message whose tool_use would be
    /// dropped).
    fn is_pair_boundary(rest: &[Message], idx: usize) -> bool {
        if idx >= rest.len() {
            return true;
        }
        // Starting on a tool_result message would orphan it unless its
        // matching tool_use is also in the kept range (impossible here,
        // since the tool_use always precedes its result) — so starting mid
        // pair is only safe if this message has no unmatched tool_result
        // referencing something before idx, and no tool_use whose result
        // lives before idx.
        let msg = &rest[idx];
        if msg.content.tool_results().iter().any(|b| {
            let referenced_id = b.tool_result_ref();
            referenced_id.is_some_and(|id| {
                rest[..idx].iter().any(|m| {
                    m.content
                        .tool_uses()
                        .iter()
                        .any(|u| u.tool_use_id() == Some(id))
                })
            })
        }) {
            return false;
        }
        if idx > 0 {
            if let Some(prev) = rest.get(idx - 1) {
                if prev.has_dangling_tool_use() {
                    return false;
                }
            }
        }
        true
    }
}

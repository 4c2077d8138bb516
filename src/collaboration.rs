//! # CollaborationManager — bounded-round turn-taking
//!
//! Drives a conversation across named agents: picks an initiator, hands the
//! task from agent to agent until a completion indicator appears or the
//! round budget runs out, then asks the model to synthesize the transcript.
//! Re-architects a deep-inheritance `CollaborativeAgent` base class as a
//! small trait plus a reusable outbox.

use crate::error::{Error, Result};
use crate::message::{Message, Protocol};
use crate::transport::ModelClient;
use crate::types::AgentConfig;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

/// Default case-insensitive substrings that end a collaboration round early.
pub const DEFAULT_COMPLETION_INDICATORS: &[&str] =
    &["task complete", "finished", "done", "no further action needed", "final result"];

/// A participant in a [`CollaborationManager`] conversation.
///
/// Re-architected from an abstract-base-plus-overrides shape into a small
/// interface composed into concrete agents, rather than inherited.
#[async_trait]
pub trait CollaborativeAgent: Send + Sync {
    /// This agent's unique id within the manager.
    fn id(&self) -> &str;

    /// Capability tags shown to the model when choosing an initiator.
    fn capabilities(&self) -> &[String];

    /// Run `task`, returning the agent's answer text.
    async fn run(&self, task: &str) -> Result<String>;

    /// Deliver an inter-agent [`Message`] to this agent. No-op by default;
    /// concrete agents override it to feed the message into their own state.
    async fn receive(&self, _message: &Message) {}

    /// Messages this agent wants routed since the last drain. Empty by
    /// default; concrete agents override it to participate in the
    /// message-passing side-channel.
    fn drain_outbox(&self) -> Vec<Message> {
        Vec::new()
    }
}

/// One turn in a collaboration's transcript.
#[derive(Debug, Clone)]
pub struct CollaborationTurn {
    /// Round number, starting at 1.
    pub round: u32,
    /// Id of the agent that acted this turn.
    pub agent: String,
    /// The task text the agent was given.
    pub task: String,
    /// The agent's result text.
    pub result: String,
    /// When this turn completed, in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// The outcome of a [`CollaborationManager::collaborate`] call.
#[derive(Debug, Clone)]
pub struct CollaborationResult {
    /// Every turn taken, in order.
    pub turns: Vec<CollaborationTurn>,
    /// The moderator's synthesis of the whole transcript.
    pub synthesis: String,
}

/// Clock injected so the manager never calls a wall-clock primitive directly.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    })
}

/// Turn-taking coordinator over a registered set of [`CollaborativeAgent`]s.
pub struct CollaborationManager {
    agents: Vec<Arc<dyn CollaborativeAgent>>,
    client: Arc<dyn ModelClient>,
    config: AgentConfig,
    protocol: Protocol,
    enable_message_passing: bool,
    max_rounds: u32,
    completion_indicators: Vec<String>,
    clock: Clock,
}

impl CollaborationManager {
    /// Build a manager that asks `client` for initiator/handoff/synthesis
    /// decisions, bounded to `max_rounds` turns.
    pub fn new(client: Arc<dyn ModelClient>, config: AgentConfig, max_rounds: u32) -> Self {
        Self {
            agents: Vec::new(),
            client,
            config,
            protocol: Protocol::named("broadcast"),
            enable_message_passing: false,
            max_rounds,
            completion_indicators: DEFAULT_COMPLETION_INDICATORS.iter().map(|s| s.to_string()).collect(),
            clock: system_clock(),
        }
    }

    /// Override the protocol used to validate routed messages.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Enable the message-passing side-channel.
    pub fn with_message_passing(mut self, enabled: bool) -> Self {
        self.enable_message_passing = enabled;
        self
    }

    /// Override the completion-indicator substrings, configurable rather
    /// than hardcoded so callers can tune them per domain.
    pub fn with_completion_indicators(mut self, indicators: Vec<String>) -> Self {
        self.completion_indicators = indicators;
        self
    }

    /// Override the clock (used by tests for deterministic timestamps).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Register an agent. Order is preserved for initiator-selection fallback.
    pub fn register(&mut self, agent: Arc<dyn CollaborativeAgent>) {
        self.agents.push(agent);
    }

    fn find(&self, id: &str) -> Option<&Arc<dyn CollaborativeAgent>> {
        self.agents.iter().find(|a| a.id() == id)
    }

    async fn ask_model(&self, prompt: &str) -> Result<String> {
        let messages = vec![crate::types::Message::user(prompt)];
        let response = self.client.complete(&self.config, &messages, &[]).await?;
        Ok(response.concatenated_text())
    }

    async fn choose_initiator(&self) -> String {
        let listing = self
            .agents
            .iter()
            .map(|a| format!("{}: [{}]", a.id(), a.capabilities().join(", ")))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Given these agents:\n{listing}\nWhich agent should start this task? Respond with only the agent id."
        );
        let fallback = || self.agents[0].id().to_string();
        match self.ask_model(&prompt).await {
            Ok(text) => {
                let trimmed = text.trim();
                if self.find(trimmed).is_some() {
                    trimmed.to_string()
                } else {
                    fallback()
                }
            }
            Err(_) => fallback(),
        }
    }

    fn completion_reached(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.completion_indicators.iter().any(|indicator| lower.contains(&indicator.to_lowercase()))
    }

    async fn route_outbox(&self, sender_id: &str) {
        if !self.enable_message_passing {
            return;
        }
        let Some(sender) = self.find(sender_id) else { return };
        for message in sender.drain_outbox() {
            if !self.protocol.accepts(&message) {
                warn!("collaboration: dropping message {} failing protocol", message.id);
                continue;
            }
            if message.is_broadcast() {
                for agent in &self.agents {
                    if agent.id() != sender_id {
                        agent.receive(&message).await;
                    }
                }
            } else if let Some(recipient) = self.find(&message.to) {
                recipient.receive(&message).await;
            } else {
                warn!("collaboration: dropping message to unknown recipient '{}'", message.to);
            }
        }
    }

    async fn synthesize(&self, turns: &[CollaborationTurn]) -> String {
        let transcript = turns
            .iter()
            .map(|t| format!("[round {}] {}: {}", t.round, t.agent, t.result))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("Synthesize a final answer from this collaboration transcript:\n{transcript}");
        match self.ask_model(&prompt).await {
            Ok(text) => text,
            Err(_) => turns.last().map(|t| t.result.clone()).unwrap_or_default(),
        }
    }

    /// Drive a bounded-round conversation starting from `task`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no agents are registered.
    pub async fn collaborate(&self, task: &str) -> Result<CollaborationResult> {
        if self.agents.is_empty() {
            return Err(Error::config("CollaborationManager has no registered agents"));
        }

        let mut current_agent = self.choose_initiator().await;
        let mut current_task = task.to_string();
        let mut turns = Vec::new();

        for round in 1..=self.max_rounds {
            let Some(agent) = self.find(&current_agent) else {
                break;
            };
            let result = agent.run(&current_task).await.unwrap_or_else(|e| format!("error: {e}"));
            turns.push(CollaborationTurn {
                round,
                agent: current_agent.clone(),
                task: current_task.clone(),
                result: result.clone(),
                timestamp_ms: (self.clock)(),
            });
            self.route_outbox(&current_agent).await;

            if self.completion_reached(&result) {
                break;
            }

            let listing = self
                .agents
                .iter()
                .filter(|a| a.id() != current_agent)
                .map(|a| a.id().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let prompt = format!(
                "Current result:\n{result}\n\nOther agents: {listing}.\n\
                 Which agent should continue, and what should their task be? \
                 Respond with \"AGENT_ID: task\" or \"COMPLETE\"."
            );
            let handoff = self.ask_model(&prompt).await.unwrap_or_else(|_| "COMPLETE".to_string());
            let handoff = handoff.trim();
            if handoff.eq_ignore_ascii_case("COMPLETE") {
                break;
            }
            match handoff.split_once(':') {
                Some((next_id, next_task)) if self.find(next_id.trim()).is_some() => {
                    current_agent = next_id.trim().to_string();
                    current_task = next_task.trim().to_string();
                }
                _ => break,
            }
        }

        let synthesis = self.synthesize(&turns).await;
        Ok(CollaborationResult { turns, synthesis })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{CompletionResponse, StopReason, StubClient};
    use crate::types::{Block, TokenUsage};

    struct StaticAgent {
        id: String,
        reply: String,
    }

    #[async_trait]
    impl CollaborativeAgent for StaticAgent {
        fn id(&self) -> &str {
            &self.id
        }
        fn capabilities(&self) -> &[String] {
            &[]
        }
        async fn run(&self, _task: &str) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    fn text_response(text: &str) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content_blocks: vec![Block::text(text)],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }

    #[tokio::test]
    async fn test_zero_agents_fails_before_any_model_call() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let manager = CollaborationManager::new(client, config, 3);
        assert!(manager.collaborate("task").await.is_err());
    }

    #[tokio::test]
    async fn test_completion_indicator_stops_round_early() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![
            text_response("alpha"), // initiator
            text_response("final synthesis"),
        ]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let mut manager = CollaborationManager::new(client, config, 5);
        manager.register(Arc::new(StaticAgent {
            id: "alpha".to_string(),
            reply: "task complete, all good".to_string(),
        }));

        let result = manager.collaborate("task").await.unwrap();
        assert_eq!(result.turns.len(), 1);
        assert_eq!(result.synthesis, "final synthesis");
    }

    #[tokio::test]
    async fn test_synthesis_falls_back_to_last_turn_on_model_failure() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("alpha")]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let mut manager = CollaborationManager::new(client, config, 5);
        manager.register(Arc::new(StaticAgent {
            id: "alpha".to_string(),
            reply: "done here".to_string(),
        }));

        let result = manager.collaborate("task").await.unwrap();
        assert_eq!(result.synthesis, "done here");
    }
}

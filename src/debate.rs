//! # DebateSystem — round-based multi-agent debate with moderated synthesis
//!
//! Each round, every registered agent speaks once, seeing the concatenated
//! transcript of everything said before it. A lexical agreement heuristic
//! drives optional early stopping; a moderator produces a 4-part synthesis
//! at the end. A learned, history-tuning policy for round count and
//! consensus threshold is deliberately not reproduced — `optimal_rounds`
//! and `consensus_threshold` are plain [`DebateConfig`] fields.

use crate::error::Result;
use crate::transport::ModelClient;
use crate::types::AgentConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// A participant in a debate.
#[async_trait]
pub trait DebateAgent: Send + Sync {
    /// This agent's display name in the transcript.
    fn name(&self) -> &str;

    /// Produce this agent's statement for the current round, given the full
    /// transcript of everything said so far.
    async fn speak(&self, topic: &str, transcript: &str) -> Result<String>;
}

/// A [`DebateAgent`] backed by a model call with a fixed persona prompt.
pub struct ModelDebateAgent {
    name: String,
    persona: String,
    client: Arc<dyn ModelClient>,
    config: AgentConfig,
}

impl ModelDebateAgent {
    /// Build an agent that argues as `persona` using `client`.
    pub fn new(name: impl Into<String>, persona: impl Into<String>, client: Arc<dyn ModelClient>, config: AgentConfig) -> Self {
        Self { name: name.into(), persona: persona.into(), client, config }
    }
}

#[async_trait]
impl DebateAgent for ModelDebateAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn speak(&self, topic: &str, transcript: &str) -> Result<String> {
        let prompt = format!(
            "You are {}. Debate topic: {topic}\n\nTranscript so far:\n{transcript}\n\nGive your statement.",
            self.persona
        );
        let messages = vec![crate::types::Message::user(prompt)];
        let response = self.client.complete(&self.config, &messages, &[]).await?;
        Ok(response.concatenated_text())
    }
}

/// Configuration for a [`DebateSystem`] run.
#[derive(Debug, Clone)]
pub struct DebateConfig {
    /// Number of rounds to conduct (unless early-stopped).
    pub rounds: u32,
    /// Whether to check agreement after each round (from round 2 onward)
    /// and stop early once the consensus threshold is met.
    pub early_stop: bool,
    /// Agreement score at or above which early stopping triggers.
    pub consensus_threshold: f64,
    /// Lowercased substrings counted as agreement signals.
    pub agree_words: Vec<String>,
    /// Lowercased substrings counted as disagreement signals.
    pub disagree_words: Vec<String>,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            early_stop: true,
            consensus_threshold: 0.75,
            // "however" appears in both lists deliberately: this lexical
            // heuristic treats it as a hedge word cutting either way
            // depending on context it can't see. Configurable rather than
            // hardcoded, so callers can fix it for their own corpus.
            agree_words: ["agree", "concur", "support", "correct", "however"].iter().map(|s| s.to_string()).collect(),
            disagree_words: ["disagree", "however", "incorrect", "oppose"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One statement within a [`DebateRound`].
#[derive(Debug, Clone)]
pub struct Statement {
    /// The speaking agent's name.
    pub agent: String,
    /// What they said.
    pub text: String,
}

/// All statements spoken in a single round.
#[derive(Debug, Clone)]
pub struct DebateRound {
    /// Round number, starting at 1.
    pub round: u32,
    /// Statements, in speaking order.
    pub statements: Vec<Statement>,
}

/// The outcome of [`DebateSystem::conduct`].
#[derive(Debug, Clone)]
pub struct DebateResult {
    /// Every round actually conducted (fewer than `config.rounds` if stopped early).
    pub rounds: Vec<DebateRound>,
    /// The moderator's 4-part synthesis.
    pub synthesis: String,
    /// The lexical agreement score computed over all statements spoken.
    pub agreement_score: f64,
}

/// Coordinates a round-based debate among registered [`DebateAgent`]s.
pub struct DebateSystem {
    agents: Vec<Arc<dyn DebateAgent>>,
    config: DebateConfig,
    client: Arc<dyn ModelClient>,
    model_config: AgentConfig,
}

impl DebateSystem {
    /// Build a debate system; `client`/`model_config` back the moderator's
    /// synthesis call.
    pub fn new(config: DebateConfig, client: Arc<dyn ModelClient>, model_config: AgentConfig) -> Self {
        Self { agents: Vec::new(), config, client, model_config }
    }

    /// Register a debate participant. Speaking order follows registration order.
    pub fn register(&mut self, agent: Arc<dyn DebateAgent>) {
        self.agents.push(agent);
    }

    fn agreement_score(&self, rounds: &[DebateRound]) -> f64 {
        let mut agree = 0usize;
        let mut disagree = 0usize;
        for round in rounds {
            for statement in &round.statements {
                let lower = statement.text.to_lowercase();
                agree += self.config.agree_words.iter().filter(|w| lower.contains(w.as_str())).count();
                disagree += self.config.disagree_words.iter().filter(|w| lower.contains(w.as_str())).count();
            }
        }
        if agree + disagree == 0 {
            0.5
        } else {
            agree as f64 / (agree + disagree) as f64
        }
    }

    fn build_transcript(rounds: &[DebateRound]) -> String {
        let mut transcript = String::new();
        for round in rounds {
            transcript.push_str(&format!("=== Round {} ===\n", round.round));
            for statement in &round.statements {
                transcript.push_str(&format!("{}:\n{}\n", statement.agent, statement.text));
            }
        }
        transcript
    }

    async fn moderate(&self, transcript: &str) -> String {
        let prompt = format!(
            "Here is a debate transcript:\n{transcript}\n\n\
             Produce a synthesis with exactly four parts: \
             (1) points of agreement, (2) valid concerns raised, \
             (3) a recommendation with rationale, (4) risks and mitigations."
        );
        let messages = vec![crate::types::Message::user(prompt)];
        match self.client.complete(&self.model_config, &messages, &[]).await {
            Ok(response) => response.concatenated_text(),
            Err(_) => Self::fallback_synthesis_text(),
        }
    }

    fn fallback_synthesis_text() -> String {
        "Synthesis unavailable; see transcript for the raw debate.".to_string()
    }

    /// Conduct the debate over `topic`, running rounds in sequence and
    /// early-stopping (after at least 2 rounds) once the agreement score
    /// meets `config.consensus_threshold`, if `config.early_stop` is set.
    pub async fn conduct(&self, topic: &str) -> Result<DebateResult> {
        let mut rounds: Vec<DebateRound> = Vec::new();
        let mut transcript = String::new();

        for round_number in 1..=self.config.rounds {
            transcript.push_str(&format!("=== Round {round_number} ===\n"));
            let mut statements = Vec::new();
            for agent in &self.agents {
                let text = agent.speak(topic, &transcript).await?;
                transcript.push_str(&format!("{}:\n{}\n", agent.name(), text));
                statements.push(Statement { agent: agent.name().to_string(), text });
            }
            rounds.push(DebateRound { round: round_number, statements });

            if self.config.early_stop && rounds.len() >= 2 {
                let score = self.agreement_score(&rounds);
                if score >= self.config.consensus_threshold {
                    break;
                }
            }
        }

        let agreement_score = self.agreement_score(&rounds);
        let full_transcript = Self::build_transcript(&rounds);
        let synthesis = self.moderate(&full_transcript).await;

        Ok(DebateResult { rounds, synthesis, agreement_score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{CompletionResponse, StopReason, StubClient};
    use crate::types::{Block, TokenUsage};

    struct ScriptedAgent {
        name: String,
        lines: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DebateAgent for ScriptedAgent {
        fn name(&self) -> &str {
            &self.name
        }
        async fn speak(&self, _topic: &str, _transcript: &str) -> Result<String> {
            let mut lines = self.lines.lock().unwrap();
            Ok(if lines.is_empty() { "no comment".to_string() } else { lines.remove(0) })
        }
    }

    fn scripted(name: &str, lines: Vec<&str>) -> Arc<ScriptedAgent> {
        Arc::new(ScriptedAgent {
            name: name.to_string(),
            lines: std::sync::Mutex::new(lines.into_iter().map(str::to_string).collect()),
        })
    }

    fn text_response(text: &str) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content_blocks: vec![Block::text(text)],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }

    #[tokio::test]
    async fn test_early_stop_after_two_rounds_on_high_agreement() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("synthesis")]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let mut debate_config = DebateConfig { rounds: 5, ..Default::default() };
        debate_config.consensus_threshold = 0.75;
        let mut system = DebateSystem::new(debate_config, client, config);

        system.register(scripted("a", vec!["I agree with the plan", "I agree, strongly"]));
        system.register(scripted("b", vec!["I concur completely", "Yes, I agree too"]));
        system.register(scripted("c", vec!["I support this", "Agreed, let's proceed"]));

        let result = system.conduct("topic").await.unwrap();
        assert_eq!(result.rounds.len(), 2);
        assert!(result.agreement_score >= 0.75);
        assert_eq!(result.synthesis, "synthesis");
    }

    #[tokio::test]
    async fn test_neutral_score_when_no_vocabulary_matches() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("synthesis")]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let debate_config = DebateConfig { rounds: 1, early_stop: false, ..Default::default() };
        let mut system = DebateSystem::new(debate_config, client, config);
        system.register(scripted("a", vec!["the sky is blue today"]));

        let result = system.conduct("topic").await.unwrap();
        assert_eq!(result.agreement_score, 0.5);
    }

    #[tokio::test]
    async fn test_full_rounds_run_when_early_stop_disabled() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![text_response("synthesis")]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let debate_config = DebateConfig { rounds: 3, early_stop: false, ..Default::default() };
        let mut system = DebateSystem::new(debate_config, client, config);
        system.register(scripted("a", vec!["agree", "agree", "agree"]));

        let result = system.conduct("topic").await.unwrap();
        assert_eq!(result.rounds.len(), 3);
    }

    #[tokio::test]
    async fn test_synthesis_fallback_on_model_failure() {
        let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![]));
        let config = AgentConfig::builder().model("test").build().unwrap();
        let debate_config = DebateConfig { rounds: 1, early_stop: false, ..Default::default() };
        let mut system = DebateSystem::new(debate_config, client, config);
        system.register(scripted("a", vec!["agree"]));

        let result = system.conduct("topic").await.unwrap();
        assert!(result.synthesis.contains("unavailable"));
    }
}

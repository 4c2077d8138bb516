//! # AsyncCollaborationManager — parallel, batched, and race execution
//!
//! Three execution modes over a `{agent_id → task}` map, each launching
//! [`crate::collaboration::CollaborativeAgent`] workers on independent
//! `tokio::spawn` tasks. Contexts are not shared between workers; they
//! communicate only through the manager's result map and
//! [`crate::shared_memory::SharedMemory`].

use crate::collaboration::CollaborativeAgent;
use crate::error::{Error, Result};
use crate::transport::ModelClient;
use crate::types::AgentConfig;
use futures::future::select_all;
use std::collections::HashMap;
use std::sync::Arc;

/// The per-agent outcome of [`AsyncCollaborationManager::execute_parallel`].
/// Failures are captured here rather than raised, so one agent's error never
/// aborts the others.
#[derive(Debug, Clone)]
pub struct AsyncOutcome {
    /// Whether the agent's run succeeded.
    pub success: bool,
    /// The agent's answer, if it succeeded.
    pub result: Option<String>,
    /// The error message, if it failed.
    pub error: Option<String>,
}

impl AsyncOutcome {
    fn ok(result: String) -> Self {
        Self { success: true, result: Some(result), error: None }
    }

    fn err(error: impl Into<String>) -> Self {
        Self { success: false, result: None, error: Some(error.into()) }
    }
}

/// Coordinator for parallel/batched/race execution across registered agents.
pub struct AsyncCollaborationManager {
    order: Vec<String>,
    agents: HashMap<String, Arc<dyn CollaborativeAgent>>,
    client: Arc<dyn ModelClient>,
    config: AgentConfig,
}

impl AsyncCollaborationManager {
    /// Build a manager that asks `client` to decompose/synthesize for
    /// [`AsyncCollaborationManager::collaborate_parallel`].
    pub fn new(client: Arc<dyn ModelClient>, config: AgentConfig) -> Self {
        Self { order: Vec::new(), agents: HashMap::new(), client, config }
    }

    /// Register an agent, in insertion order.
    pub fn register(&mut self, agent: Arc<dyn CollaborativeAgent>) {
        let id = agent.id().to_string();
        if !self.agents.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.agents.insert(id, agent);
    }

    /// Run every `(agent_id, task)` pair on its own worker; returns once all
    /// have finished, regardless of individual success/failure.
    pub async fn execute_parallel(&self, tasks: HashMap<String, String>) -> HashMap<String, AsyncOutcome> {
        let mut handles = Vec::new();
        for (agent_id, task) in tasks {
            let agent = self.agents.get(&agent_id).cloned();
            handles.push(tokio::spawn(async move {
                let outcome = match agent {
                    Some(agent) => match agent.run(&task).await {
                        Ok(result) => AsyncOutcome::ok(result),
                        Err(e) => AsyncOutcome::err(e.to_string()),
                    },
                    None => AsyncOutcome::err(format!("unknown agent: {agent_id}")),
                };
                (agent_id, outcome)
            }));
        }

        let mut results = HashMap::new();
        for handle in handles {
            match handle.await {
                Ok((agent_id, outcome)) => {
                    results.insert(agent_id, outcome);
                }
                Err(e) => {
                    // The worker panicked or was cancelled; surface it as a
                    // failure rather than propagating the join error.
                    log::warn!("async_collaboration: worker join failed: {e}");
                }
            }
        }
        results
    }

    /// Partition `tasks` into chunks of at most `max_concurrent` and run each
    /// chunk as [`AsyncCollaborationManager::execute_parallel`] in sequence,
    /// merging results in batch order.
    pub async fn execute_batched(
        &self,
        tasks: HashMap<String, String>,
        max_concurrent: usize,
    ) -> HashMap<String, AsyncOutcome> {
        let max_concurrent = max_concurrent.max(1);
        let mut entries: Vec<(String, String)> = tasks.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut merged = HashMap::new();
        for chunk in entries.chunks(max_concurrent) {
            let batch: HashMap<String, String> = chunk.iter().cloned().collect();
            let batch_results = self.execute_parallel(batch).await;
            merged.extend(batch_results);
        }
        merged
    }

    /// Return the first agent to finish successfully, as `(agent_id,
    /// result)`. Other in-flight workers are cancelled via
    /// `JoinHandle::abort` — cooperative, best-effort cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `tasks` is empty, or [`Error::Other`] if
    /// every agent fails.
    pub async fn race(&self, tasks: HashMap<String, String>) -> Result<(String, String)> {
        if tasks.is_empty() {
            return Err(Error::config("race requires at least one viable agent"));
        }

        let mut handles = Vec::new();
        for (agent_id, task) in tasks {
            let agent = self.agents.get(&agent_id).cloned();
            handles.push(tokio::spawn(async move {
                match agent {
                    Some(agent) => agent.run(&task).await.map(|r| (agent_id, r)),
                    None => Err(Error::config(format!("unknown agent: {agent_id}"))),
                }
            }));
        }

        let mut remaining = handles;
        while !remaining.is_empty() {
            let (outcome, _index, rest) = select_all(remaining).await;
            remaining = rest;
            if let Ok(Ok((agent_id, text))) = outcome {
                for handle in &remaining {
                    handle.abort();
                }
                return Ok((agent_id, text));
            }
        }
        Err(Error::other("race: no agent completed successfully"))
    }

    async fn ask_model(&self, prompt: &str) -> Result<String> {
        let messages = vec![crate::types::Message::user(prompt)];
        let response = self.client.complete(&self.config, &messages, &[]).await?;
        Ok(response.concatenated_text())
    }

    /// Ask the model to decompose `task` into `n` subtasks, assign the first
    /// `n` registered agents one each, run [`AsyncCollaborationManager::execute_parallel`],
    /// then ask the model to synthesize the combined results.
    pub async fn collaborate_parallel(&self, task: &str, n: usize) -> Result<String> {
        if n == 0 || self.order.is_empty() {
            return Err(Error::config("collaborate_parallel requires at least one registered agent"));
        }
        let n = n.min(self.order.len());
        let prompt = format!("Decompose the following task into exactly {n} independent subtasks, one per line:\n{task}");
        let subtasks: Vec<String> = match self.ask_model(&prompt).await {
            Ok(text) => text.lines().map(str::trim).filter(|l| !l.is_empty()).take(n).map(str::to_string).collect(),
            Err(_) => Vec::new(),
        };

        let mut tasks = HashMap::new();
        for (i, agent_id) in self.order.iter().take(n).enumerate() {
            let subtask = subtasks.get(i).cloned().unwrap_or_else(|| task.to_string());
            tasks.insert(agent_id.clone(), subtask);
        }

        let outcomes = self.execute_parallel(tasks).await;
        let transcript = self
            .order
            .iter()
            .take(n)
            .filter_map(|id| outcomes.get(id).map(|o| (id, o)))
            .map(|(id, outcome)| match &outcome.result {
                Some(result) => format!("{id}: {result}"),
                None => format!("{id}: (failed: {})", outcome.error.clone().unwrap_or_default()),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let synthesis_prompt = format!("Synthesize a final answer from these subtask results:\n{transcript}");
        match self.ask_model(&synthesis_prompt).await {
            Ok(text) => Ok(text),
            Err(_) => Ok(transcript),
        }
    }
}

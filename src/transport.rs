//! # Model Transport Interface
//!
//! The core calls a single operation on the model transport: `complete(...)`.
//! The transport itself — the HTTP client that actually talks to a hosted or
//! local completion endpoint — is an external collaborator, not part of the
//! core. This module defines the interface the rest of the crate programs
//! against, a minimal `HttpModelClient` default implementation, and a
//! `StubClient` test double that drives deterministic scripted responses.

use crate::error::{Error, Result};
use crate::types::{AgentConfig, Block, Message, TokenUsage};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced a complete response.
    EndTurn,
    /// The model wants to call one or more tools.
    ToolUse,
    /// The response was cut off at `max_tokens`.
    MaxTokens,
    /// The model stopped on a configured stop sequence.
    StopSequence,
}

/// The model's response to a single `complete` call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Ordered content blocks produced by the model (text and/or tool_use).
    pub content_blocks: Vec<Block>,
    /// Why generation stopped.
    pub stop_reason: StopReason,
    /// Token usage for this call.
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Concatenation of every `text` block in the response, in order.
    pub fn concatenated_text(&self) -> String {
        self.content_blocks
            .iter()
            .filter_map(|b| match b {
                Block::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// The external model-transport interface the core calls into.
///
/// Implementations are responsible for turning `(model, system, tools,
/// messages, max_tokens, temperature, thinking)` into a single
/// `CompletionResponse`, and for surfacing authentication / rate-limit /
/// server / network / validation failures as the appropriately-kinded
/// [`Error`] so [`crate::retry::RetryHandler`] can classify them.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Request a single completion.
    async fn complete(
        &self,
        config: &AgentConfig,
        messages: &[Message],
        tool_definitions: &[Value],
    ) -> Result<CompletionResponse>;
}

// ============================================================================
// HTTP MODEL CLIENT (default, non-test implementation)
// ============================================================================

/// Minimal OpenAI-compatible-endpoint client: a `reqwest::Client`, a base
/// URL, and an optional bearer token. Streaming and the rest of the wire
/// protocol are left to the concrete deployment; this is the default
/// collaborator, not the focus of this crate's test suite (which programs
/// against [`StubClient`] instead).
pub struct HttpModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpModelClient {
    /// Build a client pointed at `base_url` (e.g. `http://localhost:1234/v1`),
    /// with an optional bearer token for hosted endpoints.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(
        &self,
        config: &AgentConfig,
        messages: &[Message],
        tool_definitions: &[Value],
    ) -> Result<CompletionResponse> {
        let mut body = serde_json::json!({
            "model": config.model,
            "messages": messages,
            "max_tokens": config.max_tokens,
            "tools": tool_definitions,
        });
        if let Some(t) = config.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(system) = &config.system_prompt {
            body["system"] = serde_json::json!(system);
        }

        let mut request = self.http.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::auth(format!("transport rejected credentials: {status}")));
        }
        if status.as_u16() == 429 {
            return Err(Error::rate_limit("transport reported rate limiting"));
        }
        if status.is_server_error() {
            return Err(Error::transport(format!("transport server error: {status}")));
        }
        if !status.is_success() {
            return Err(Error::validation(format!("transport rejected request: {status}")));
        }

        let payload: Value = response.json().await?;
        parse_completion_response(&payload)
    }
}

fn parse_completion_response(payload: &Value) -> Result<CompletionResponse> {
    let stop_reason = match payload.get("stop_reason").and_then(Value::as_str) {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        Some("end_turn") | None => StopReason::EndTurn,
        Some(other) => return Err(Error::model_protocol(format!("unexpected stop_reason: {other}"))),
    };
    let content_blocks: Vec<Block> = serde_json::from_value(
        payload
            .get("content_blocks")
            .cloned()
            .unwrap_or(Value::Array(vec![])),
    )?;
    let usage = TokenUsage {
        input: payload
            .get("usage")
            .and_then(|u| u.get("input_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        output: payload
            .get("usage")
            .and_then(|u| u.get("output_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
    };
    Ok(CompletionResponse {
        content_blocks,
        stop_reason,
        usage,
    })
}

// ============================================================================
// STUB CLIENT (test double)
// ============================================================================

/// A scripted [`ModelClient`] that returns queued responses in order,
/// regardless of input. Used throughout this crate's tests to drive the
/// ReAct loop, retry handler, and multi-agent managers deterministically
/// without a live endpoint.
pub struct StubClient {
    responses: Mutex<Vec<Result<CompletionResponse>>>,
    calls: Mutex<u32>,
}

impl StubClient {
    /// Build a stub that yields `responses` in order, one per `complete` call.
    /// Calling `complete` more times than there are queued responses returns
    /// a `ModelProtocol` error.
    pub fn new(responses: Vec<Result<CompletionResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(0),
        }
    }

    /// Build a stub that always returns the same successful text response,
    /// ending the turn immediately.
    pub fn with_text_reply(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(CompletionResponse {
            content_blocks: vec![Block::text(text)],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage { input: 10, output: 5 },
        })])
    }

    /// Number of times `complete` has been called so far.
    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ModelClient for StubClient {
    async fn complete(
        &self,
        _config: &AgentConfig,
        _messages: &[Message],
        _tool_definitions: &[Value],
    ) -> Result<CompletionResponse> {
        *self.calls.lock().unwrap() += 1;
        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            return Err(Error::model_protocol("StubClient ran out of scripted responses"));
        }
        queue.remove(0)
    }
}

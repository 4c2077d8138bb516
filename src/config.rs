//! # Provider helpers
//!
//! Thin, ambient glue for resolving a model-transport's conventional base
//! URL and default model id. The transport itself remains an external
//! collaborator; this module only picks sane defaults so callers building
//! an [`crate::transport::HttpModelClient`] don't have to hardcode
//! endpoints.

/// A known model-transport provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// An OpenAI-compatible hosted endpoint.
    OpenAi,
    /// An Anthropic-compatible hosted endpoint.
    Anthropic,
    /// A local OpenAI-compatible endpoint (e.g. Ollama, vLLM).
    Local,
}

/// The conventional base URL for `provider`.
pub fn get_base_url(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "https://api.openai.com/v1",
        Provider::Anthropic => "https://api.anthropic.com/v1",
        Provider::Local => "http://localhost:11434/v1",
    }
}

/// The conventional default model id for `provider`.
pub fn get_model(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "gpt-4o-mini",
        Provider::Anthropic => "claude-3-5-sonnet-latest",
        Provider::Local => "llama3",
    }
}

//! LLM provider abstraction (spec.md §6.5): a structured-output call shape
//! used by the extractor and by agents for their final response, and a
//! tool-using loop shape used by agents while reasoning. The provider itself
//! is treated as a black box — out of scope per spec.md §1 — so this module
//! only defines the trait boundary and a deterministic mock for tests,
//! grounded on `cloudllm::client_wrapper::ClientWrapper`.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into() }
    }
}

/// A tool invocation the LLM asked the caller to perform, carried back in the
/// next `Role::Tool` message (spec.md §6.5 tool-using loop).
#[derive(Debug, Clone)]
pub struct NativeToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One turn of a provider response: free text plus any tool calls requested.
#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub content: String,
    pub tool_calls: Vec<NativeToolCall>,
}

#[derive(Debug, Clone)]
pub enum LlmError {
    Timeout,
    Provider(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Timeout => write!(f, "LLM call timed out"),
            LlmError::Provider(msg) => write!(f, "LLM provider error: {}", msg),
        }
    }
}

impl std::error::Error for LlmError {}

/// Provider-agnostic chat completion call, with an optional JSON-schema
/// constraint for structured output (spec.md §6.5, §9 "LLM structured output
/// + validation").
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        tools: &[Value],
        response_schema: Option<&Value>,
    ) -> Result<LlmCompletion, LlmError>;

    fn model_name(&self) -> &str;
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Replays a fixed queue of completions, in order, one per call — enough
    /// to drive deterministic agent/extractor tests without a live provider.
    pub struct ScriptedLlmClient {
        responses: Mutex<Vec<Result<LlmCompletion, LlmError>>>,
        model: String,
    }

    impl ScriptedLlmClient {
        pub fn new(responses: Vec<Result<LlmCompletion, LlmError>>) -> Self {
            Self { responses: Mutex::new(responses), model: "mock-model".to_string() }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn complete(
            &self,
            _messages: &[LlmMessage],
            _tools: &[Value],
            _response_schema: Option<&Value>,
        ) -> Result<LlmCompletion, LlmError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::Provider("scripted responses exhausted".to_string()));
            }
            responses.remove(0)
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }
}

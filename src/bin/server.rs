//! Binary entrypoint: wires configuration, logging, the operational store,
//! tool registry, an LLM client, the phase orchestrator, and the HTTP
//! surface together, then serves them with axum.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use skymarshal::skymarshal::api::{build_router, AppState};
use skymarshal::skymarshal::api::request_store::InMemoryRequestStore;
use skymarshal::skymarshal::api::session_store::InMemorySessionStore;
use skymarshal::skymarshal::config::SkymarshalConfig;
use skymarshal::skymarshal::dal::InMemoryOperationalStore;
use skymarshal::skymarshal::llm::{LlmClient, LlmCompletion, LlmError, LlmMessage, NativeToolCall, Role};
use skymarshal::skymarshal::orchestrator::PhaseOrchestrator;
use skymarshal::skymarshal::tools::ToolRegistry;

/// A minimal OpenAI-compatible chat-completions client. The provider itself
/// is out of scope (spec.md §1); this is the one concrete implementation of
/// `LlmClient` needed to run the service standalone.
struct HttpLlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl HttpLlmClient {
    fn from_env() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let base_url = std::env::var("SKYMARSHAL_LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("SKYMARSHAL_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self { http: reqwest::Client::new(), api_key, base_url, model }
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        tools: &[Value],
        response_schema: Option<&Value>,
    ) -> Result<LlmCompletion, LlmError> {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": Self::role_str(m.role), "content": m.content}))
            .collect();

        let mut body = json!({"model": self.model, "messages": messages});
        if !tools.is_empty() {
            let wire_tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t["name"],
                            "description": t["description"],
                            "parameters": t.get("parameters").cloned().unwrap_or(json!({})),
                        },
                    })
                })
                .collect();
            body["tools"] = json!(wire_tools);
        }
        if let Some(schema) = response_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {"name": "skymarshal_output", "schema": schema, "strict": true},
            });
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Provider(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider(format!("{}: {}", status, text)));
        }

        let payload: Value = response.json().await.map_err(|err| LlmError::Provider(err.to_string()))?;
        let message = &payload["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let id = call["id"].as_str()?.to_string();
                        let function = &call["function"];
                        let name = function["name"].as_str()?.to_string();
                        let args_str = function["arguments"].as_str().unwrap_or("{}");
                        let arguments: Value = serde_json::from_str(args_str).unwrap_or(json!({}));
                        Some(NativeToolCall { id, name, arguments })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(LlmCompletion { content, tool_calls })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = SkymarshalConfig::from_env();
    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::from_env());
    let store = Arc::new(InMemoryOperationalStore::new());
    let tools = Arc::new(ToolRegistry::new(store));
    let orchestrator = Arc::new(PhaseOrchestrator::new(config.clone(), llm, tools));

    let state = AppState {
        orchestrator,
        requests: Arc::new(InMemoryRequestStore::new()),
        sessions: Arc::new(InMemorySessionStore::new()),
        config: config.clone(),
    };

    let app = build_router(state);
    let addr = format!("{}:{}", config.http_host, config.http_port);
    log::info!("skymarshal listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.expect("failed to bind HTTP listener");
    axum::serve(listener, app).await.expect("server error");
}

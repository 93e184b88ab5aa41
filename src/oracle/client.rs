//! Client for OpenAI-compatible chat-completion APIs with function calling.
//!
//! Only the subset the SQL agent needs is modelled: text and tool-call
//! messages, function tool specs, and the first choice of the response.

use crate::config::LlmSettings;
use crate::error::{DashboardError, DbResult};
use futures_util::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

/// One chat message in wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn assistant_with_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Trimmed text content, if any.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as produced by the model.
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

/// A function the model may call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    kind: &'static str,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

impl ToolSpec {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: JsonValue,
    ) -> Self {
        Self {
            kind: "function",
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Something that turns a conversation into the next assistant message.
pub trait CompletionModel: Send + Sync {
    fn complete<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolSpec],
    ) -> BoxFuture<'a, DbResult<Message>>;
}

/// Chat-completion client for Groq, OpenAI and compatible servers.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(settings: &LlmSettings, api_key: impl Into<String>) -> DbResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| DashboardError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: api_key.into(),
            timeout: settings.timeout,
        })
    }

    async fn send(&self, messages: &[Message], tools: &[ToolSpec]) -> DbResult<Message> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            tools,
            temperature: 0.0,
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            "Requesting chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, &text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            DashboardError::oracle(format!("Failed to parse chat completion response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| DashboardError::oracle("Chat completion returned no choices"))
    }

    fn map_transport_error(&self, err: reqwest::Error) -> DashboardError {
        if err.is_timeout() {
            DashboardError::timeout("chat completion", self.timeout.as_secs() as u32)
        } else {
            DashboardError::connection(
                format!("Inference service request failed: {err}"),
                "Check network access to the inference service and its base URL",
            )
        }
    }
}

impl CompletionModel for OpenAiCompatClient {
    fn complete<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolSpec],
    ) -> BoxFuture<'a, DbResult<Message>> {
        Box::pin(self.send(messages, tools))
    }
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolSpec],
    temperature: f32,
}

fn no_tools(tools: &&[ToolSpec]) -> bool {
    tools.is_empty()
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn map_http_error(status: StatusCode, body: &str) -> DashboardError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DashboardError::configuration(
            format!("The inference service rejected the API key: {message}"),
        ),
        _ => DashboardError::oracle(format!("Inference service returned {status}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let messages = vec![Message::system("be brief"), Message::user("hi")];
        let tools = vec![ToolSpec::function("list_tables", "List tables", json!({"type": "object"}))];
        let body = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            tools: &tools,
            temperature: 0.0,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["messages"][1]["role"], "user");
        assert!(v["messages"][0].get("tool_calls").is_none());
        assert_eq!(v["tools"][0]["type"], "function");
        assert_eq!(v["tools"][0]["function"]["name"], "list_tables");
    }

    #[test]
    fn test_response_with_tool_calls() {
        let raw = json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "run_query", "arguments": "{\"sql\":\"SELECT 1\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let message = &parsed.choices[0].message;
        assert_eq!(message.text(), None);
        assert_eq!(message.tool_calls[0].function.name, "run_query");
    }

    #[test]
    fn test_http_error_mapping() {
        let err = map_http_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Invalid API Key"}}"#,
        );
        assert!(matches!(err, DashboardError::Configuration { .. }));
        assert!(err.to_string().contains("Invalid API Key"));

        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, DashboardError::Oracle { .. }));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let settings = LlmSettings {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..LlmSettings::default()
        };
        let client = OpenAiCompatClient::new(&settings, "k").unwrap();
        assert_eq!(client.endpoint, "http://localhost:8080/v1/chat/completions");
        assert!(!format!("{client:?}").contains("\"k\""));
    }
}

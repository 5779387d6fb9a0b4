//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Groq and any
//! endpoint exposing `/chat/completions` with function calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskweave_core::error::ProviderError;
use taskweave_core::prompt::{Prompt, PromptMessage, ToolSchema};
use taskweave_core::provider::{Provider, ProviderReply};
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert prompt messages to OpenAI API format.
    fn to_api_messages(messages: &[PromptMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: Some(m.content.clone()),
                tool_calls: None,
            })
            .collect()
    }

    /// Convert tool schemas to OpenAI API format.
    fn to_api_tools(tools: &[ToolSchema]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(prompt.messages()),
            "temperature": self.temperature,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !prompt.tools().is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(prompt.tools()));
        }

        body
    }

    /// The first tool call wins; otherwise the text content is the reply.
    fn to_reply(response: ApiResponse) -> Result<ProviderReply, ProviderError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        if let Some(call) = choice.message.tool_calls.and_then(|c| c.into_iter().next()) {
            let args = if call.function.arguments.trim().is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    ProviderError::InvalidResponse(format!(
                        "tool call arguments for '{}' are not JSON: {e}",
                        call.function.name
                    ))
                })?
            };
            return Ok(ProviderReply::Invocation {
                tool: call.function.name,
                args,
            });
        }

        Ok(ProviderReply::Text(choice.message.content.unwrap_or_default()))
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &Prompt) -> Result<ProviderReply, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(prompt);

        debug!(
            provider = %self.name,
            model = %self.model,
            messages = prompt.messages().len(),
            tools = prompt.tools().len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Self::to_reply(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(data: &str) -> Result<ProviderReply, ProviderError> {
        OpenAiCompatProvider::to_reply(serde_json::from_str(data).unwrap())
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None, "llama3");
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
        assert_eq!(provider.model(), "llama3");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://host/v1/", "k", "m");
        assert_eq!(provider.base_url, "http://host/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            PromptMessage::system("Goals"),
            PromptMessage::user("Hello"),
            PromptMessage::assistant(r#"{"tool_executed":true}"#),
        ];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        let roles: Vec<&str> = api_messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
    }

    #[test]
    fn tools_only_attached_when_present() {
        let provider = OpenAiCompatProvider::openai("sk-test", "gpt-4o").with_max_tokens(256);
        let bare = Prompt::new(vec![PromptMessage::user("hi")], vec![], Default::default());
        let body = provider.request_body(&bare);
        assert!(body.get("tools").is_none());
        assert_eq!(body["max_tokens"], 256);

        let with_tools = Prompt::new(
            vec![PromptMessage::user("hi")],
            vec![ToolSchema {
                name: "terminate".into(),
                description: "Stop".into(),
                parameters: json!({"type": "object"}),
            }],
            Default::default(),
        );
        let body = provider.request_body(&with_tools);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "terminate");
        assert_eq!(body["model"], "gpt-4o");
    }

    #[test]
    fn first_tool_call_becomes_invocation() {
        let reply = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[
                {"id":"call_1","type":"function","function":{"name":"double","arguments":"{\"x\": 3}"}},
                {"id":"call_2","type":"function","function":{"name":"echo","arguments":"{}"}}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            reply,
            ProviderReply::Invocation {
                tool: "double".into(),
                args: json!({"x": 3}),
            }
        );
    }

    #[test]
    fn text_content_without_tool_calls() {
        let reply = parse(r#"{"choices":[{"message":{"role":"assistant","content":"I don't know"}}]}"#)
            .unwrap();
        assert_eq!(reply, ProviderReply::Text("I don't know".into()));
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let reply = parse(
            r#"{"choices":[{"message":{"role":"assistant","tool_calls":[
                {"id":"c","type":"function","function":{"name":"list_agents","arguments":""}}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            reply,
            ProviderReply::Invocation {
                tool: "list_agents".into(),
                args: json!({}),
            }
        );
    }

    #[test]
    fn malformed_arguments_and_missing_choices_are_errors() {
        let bad_args = parse(
            r#"{"choices":[{"message":{"role":"assistant","tool_calls":[
                {"id":"c","type":"function","function":{"name":"echo","arguments":"{oops"}}
            ]}}]}"#,
        );
        assert!(matches!(bad_args, Err(ProviderError::InvalidResponse(_))));

        let no_choices = parse(r#"{"choices":[]}"#);
        assert!(matches!(no_choices, Err(ProviderError::InvalidResponse(_))));
    }
}

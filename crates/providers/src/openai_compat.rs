//! OpenAI-compatible gateway implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any other
//! endpoint speaking the `/chat/completions` dialect. The adapter renders
//! the turn log into API messages, advertises the tool catalog, and folds
//! the response into a [`ModelResponse`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use provost_core::{
    GatewayError, ModelGateway, ModelResponse, Role, ToolCallRequest, ToolCatalogEntry, Turn,
};

/// An OpenAI-compatible model gateway.
///
/// This covers the vast majority of providers, since most expose an
/// OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatGateway {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatGateway {
    /// Create a new OpenAI-compatible gateway.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| GatewayError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.2,
            client,
        })
    }

    /// Create an OpenAI gateway (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, GatewayError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an Ollama gateway (convenience constructor).
    ///
    /// Ollama does not need a real key.
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Result<Self, GatewayError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
            model,
        )
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Render the turn log into API messages.
    ///
    /// The persona leads as a system message. A tool turn becomes one
    /// `tool`-role message per result, each tied back by `tool_call_id`.
    fn to_api_messages(history: &[Turn], persona: Option<&str>) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);

        if let Some(persona) = persona {
            messages.push(ApiMessage {
                role: "system".into(),
                content: Some(persona.to_string()),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        for turn in history {
            match turn.role {
                Role::User => messages.push(ApiMessage {
                    role: "user".into(),
                    content: Some(turn.text().unwrap_or_default().to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                }),
                Role::Model => {
                    let requests = turn.requests();
                    messages.push(ApiMessage {
                        role: "assistant".into(),
                        content: turn.text().map(String::from),
                        tool_calls: if requests.is_empty() {
                            None
                        } else {
                            Some(requests.iter().map(|call| ApiToolCall::from_request(call)).collect())
                        },
                        tool_call_id: None,
                    });
                }
                Role::Tool => {
                    for result in turn.results() {
                        messages.push(ApiMessage {
                            role: "tool".into(),
                            content: Some(
                                serde_json::to_string(&result.outcome).unwrap_or_default(),
                            ),
                            tool_calls: None,
                            tool_call_id: Some(result.call_id.clone()),
                        });
                    }
                }
            }
        }

        messages
    }

    /// Render the tool catalog into API tool definitions.
    fn to_api_tools(tools: &[ToolCatalogEntry]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|entry| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    parameters: entry.parameters.clone(),
                },
            })
            .collect()
    }

    /// Fold an API choice into the loop's response union.
    ///
    /// Tool calls take precedence; commentary sent alongside them is logged
    /// and dropped, since the history records requests and answers, not
    /// thinking-out-loud.
    fn fold_choice(&self, message: ApiMessage) -> ModelResponse {
        let calls: Vec<ToolCallRequest> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                ToolCallRequest::new(
                    tc.id,
                    tc.function.name,
                    serde_json::from_str(&tc.function.arguments).unwrap_or_default(),
                )
            })
            .collect();

        if !calls.is_empty() {
            if let Some(content) = message.content.as_deref().filter(|c| !c.trim().is_empty()) {
                debug!(gateway = %self.name, content, "dropping commentary sent with tool calls");
            }
            return ModelResponse::ToolCalls(calls);
        }

        match message.content {
            Some(text) if !text.trim().is_empty() => ModelResponse::Final(text),
            _ => ModelResponse::Empty,
        }
    }
}

#[async_trait]
impl ModelGateway for OpenAiCompatGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ask(
        &self,
        history: &[Turn],
        tools: &[ToolCatalogEntry],
        persona: Option<&str>,
    ) -> Result<ModelResponse, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(history, persona),
            "temperature": self.temperature,
            "stream": false,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
        }

        debug!(gateway = %self.name, model = %self.model, turns = history.len(), "asking model");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(e.to_string())
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GatewayError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(GatewayError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "model endpoint returned error");
            return Err(GatewayError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(format!("could not parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Malformed("no choices in response".into()))?;

        Ok(self.fold_choice(choice.message))
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

impl ApiToolCall {
    fn from_request(call: &ToolCallRequest) -> Self {
        Self {
            id: call.call_id.clone(),
            r#type: "function".into(),
            function: ApiFunction {
                name: call.tool_name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    /// Arguments travel as a JSON-encoded string on this API.
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
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

// ── Tests ─────────────────────────────────────────────────────────────────

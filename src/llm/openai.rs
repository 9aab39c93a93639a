use super::{
    CompletionProvider, Decision, DECIDE_INSTRUCTION, EMPTY_DECISION_TEXT, EMPTY_SUMMARY_TEXT,
    SUMMARIZE_INSTRUCTION,
};
use crate::errors::LlmError;
use crate::tools::{ToolCall, ToolDefinition, ToolOutput};
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// OpenAI Chat Completions adapter.
pub struct OpenAiProvider {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(http: Client, base_url: &str, api_key: String, model: String) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
        }
    }

    /// First-phase request body: system + user message, tools offered with `tool_choice: auto`.
    pub fn decide_payload(&self, user_message: &str, tools: &[ToolDefinition]) -> Value {
        let mut payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": DECIDE_INSTRUCTION},
                {"role": "user", "content": user_message}
            ]
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|def| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": def.name,
                                "description": def.description,
                                "parameters": def.parameters,
                            }
                        })
                    })
                    .collect(),
            );
            payload["tool_choice"] = json!("auto");
        }
        payload
    }

    /// Second-phase request body. Replays the assistant's tool calls and one
    /// `tool` message per output. Carries no `tools` key.
    pub fn summarize_payload(
        &self,
        user_message: &str,
        calls: &[ToolCall],
        outputs: &[ToolOutput],
    ) -> Value {
        let mut messages = vec![
            json!({"role": "system", "content": SUMMARIZE_INSTRUCTION}),
            json!({"role": "user", "content": user_message}),
            json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": calls.iter().map(|call| json!({
                    "id": call.id,
                    "type": "function",
                    "function": {"name": call.name, "arguments": call.arguments}
                })).collect::<Vec<_>>()
            }),
        ];

        for output in outputs {
            let content = serde_json::to_string(&output.output)
                .unwrap_or_else(|_| "{\"status\":\"error\"}".to_string());
            messages.push(json!({
                "role": "tool",
                "tool_call_id": output.tool_call_id,
                "content": content
            }));
        }

        json!({ "model": self.model, "messages": messages })
    }

    async fn complete(&self, payload: &Value) -> Result<AssistantMessage, LlmError> {
        match self.send(payload).await {
            Err(LlmError::Timeout) => {
                warn!("Completion request timed out, retrying once");
                self.send(payload).await
            }
            other => other,
        }
    }

    async fn send(&self, payload: &Value) -> Result<AssistantMessage, LlmError> {
        debug!("POST {}", self.endpoint);
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| timeout_or(e, LlmError::Request))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Completion API error: {} - {}", status, body);
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| timeout_or(e, LlmError::Parse))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .unwrap_or_default())
    }
}

// The client timeout also covers reading the body
fn timeout_or(e: reqwest::Error, other: fn(String) -> LlmError) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        other(e.to_string())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn decide(&self, user_message: &str, tools: &[ToolDefinition]) -> Result<Decision, LlmError> {
        let message = self.complete(&self.decide_payload(user_message, tools)).await?;

        let tool_calls = message.tool_calls.unwrap_or_default();
        if !tool_calls.is_empty() {
            debug!("Model requested {} tool call(s)", tool_calls.len());
            return Ok(Decision::ToolCallsRequested(
                tool_calls
                    .into_iter()
                    .map(|call| ToolCall {
                        id: call.id,
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect(),
            ));
        }

        Ok(Decision::DirectText(
            message
                .content
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| EMPTY_DECISION_TEXT.to_string()),
        ))
    }

    async fn summarize(
        &self,
        user_message: &str,
        calls: &[ToolCall],
        outputs: &[ToolOutput],
    ) -> Result<String, LlmError> {
        let message = self
            .complete(&self.summarize_payload(user_message, calls, outputs))
            .await?;
        Ok(message
            .content
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| EMPTY_SUMMARY_TEXT.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolResult;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(Client::new(), "http://localhost/v1/", "sk-test".to_string(), "gpt-4o".to_string())
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(provider().endpoint, "http://localhost/v1/chat/completions");
    }

    #[test]
    fn summary_payload_offers_no_tools_and_replays_calls() {
        let calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "gmail_send_email".to_string(),
            arguments: "{}".to_string(),
        }];
        let outputs = vec![ToolOutput {
            tool_call_id: "call_1".to_string(),
            output: ToolResult::error("boom"),
        }];

        let payload = provider().summarize_payload("send it", &calls, &outputs);
        assert!(payload.get("tools").is_none());
        assert!(payload.get("tool_choice").is_none());

        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["content"], r#"{"status":"error","message":"boom"}"#);
    }

    #[test]
    fn decide_payload_omits_tools_when_catalog_is_empty() {
        let payload = provider().decide_payload("hi", &[]);
        assert!(payload.get("tools").is_none());

        let defs = vec![ToolDefinition {
            name: "gdocs_read_document".to_string(),
            description: "Read".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let payload = provider().decide_payload("hi", &defs);
        assert_eq!(payload["tools"][0]["function"]["name"], "gdocs_read_document");
        assert_eq!(payload["tool_choice"], "auto");
    }
}

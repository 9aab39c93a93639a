//! Completion providers behind the two-phase decide/summarize protocol.

pub mod openai;

pub use openai::OpenAiProvider;

use crate::config::Config;
use crate::errors::{ConfigError, LlmError};
use crate::tools::{ToolCall, ToolDefinition, ToolOutput};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// Instruction for the first call: prefer a tool call whenever one applies.
pub const DECIDE_INSTRUCTION: &str = "You are an expert assistant for Google Workspace. Your goal is to use the available tools (Gmail, Calendar, Docs, Sheets, Forms) to fulfill the user's request. If a tool is necessary, ONLY respond with a tool call. If not, respond directly.";

/// Instruction for the second call: report only what the tool outputs say.
pub const SUMMARIZE_INSTRUCTION: &str = "You have just executed one or more Google Workspace actions. Your final response must clearly and concisely summarize the outcome of the action(s) for the user, drawing directly from the provided tool output results.";

pub const EMPTY_DECISION_TEXT: &str = "I received an empty response. Please try rephrasing your request.";
pub const EMPTY_SUMMARY_TEXT: &str = "Could not generate a final response after tool execution.";

/// Outcome of the first completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ToolCallsRequested(Vec<ToolCall>),
    DirectText(String),
}

/// Vendor adapter for the completion API.
///
/// `summarize` never offers tools, so a turn ends after at most two calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn decide(&self, user_message: &str, tools: &[ToolDefinition]) -> Result<Decision, LlmError>;

    async fn summarize(
        &self,
        user_message: &str,
        calls: &[ToolCall],
        outputs: &[ToolOutput],
    ) -> Result<String, LlmError>;
}

pub fn build_provider(config: &Config, http: Client) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    match config.llm_provider.to_ascii_lowercase().as_str() {
        "openai" => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;
            Ok(Arc::new(OpenAiProvider::new(
                http,
                &config.openai_base_url,
                api_key,
                config.llm_model.clone(),
            )))
        }
        other => Err(ConfigError::UnsupportedProvider(other.to_string())),
    }
}

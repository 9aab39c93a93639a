//! One orchestration turn: decide, optionally execute tools, summarize.

use crate::errors::{AgentError, AuthRequired};
use crate::llm::{CompletionProvider, Decision};
use crate::tools::args::parse_arguments;
use crate::tools::{ToolCall, ToolOutput, ToolRegistry, ToolResult};
use futures::future::join_all;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Start,
    AwaitingDecision,
    ExecutingTools(usize),
    AwaitingSummary,
    Done { tool_executed: bool },
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Start => write!(f, "Start"),
            TurnState::AwaitingDecision => write!(f, "AwaitingDecision"),
            TurnState::ExecutingTools(n) => write!(f, "ExecutingTools({})", n),
            TurnState::AwaitingSummary => write!(f, "AwaitingSummary"),
            TurnState::Done { tool_executed } => write!(f, "Done(tool_executed={})", tool_executed),
        }
    }
}

/// Everything that happened in one turn. Built fresh per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatExchange {
    pub user_message: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolOutput>,
    pub final_message: String,
    pub tool_executed: bool,
}

/// The reply shape exposed to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub tool_executed: bool,
    pub tool_details: Option<Vec<ToolOutput>>,
}

impl From<ChatExchange> for ChatResponse {
    fn from(exchange: ChatExchange) -> Self {
        ChatResponse {
            message: exchange.final_message,
            tool_executed: exchange.tool_executed,
            tool_details: exchange.tool_executed.then_some(exchange.tool_results),
        }
    }
}

pub struct Orchestrator {
    llm: Arc<dyn CompletionProvider>,
    registry: Arc<ToolRegistry>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn CompletionProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self { llm, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn orchestrate(&self, user_message: &str) -> Result<ChatExchange, AgentError> {
        let mut state = TurnState::Start;
        info!("Starting orchestration for: {}", user_message);

        transition(&mut state, TurnState::AwaitingDecision);
        let decision = self
            .llm
            .decide(user_message, self.registry.get_tool_definitions())
            .await?;

        let calls = match decision {
            Decision::DirectText(text) => {
                info!("No tool call detected. Returning direct response.");
                transition(&mut state, TurnState::Done { tool_executed: false });
                return Ok(ChatExchange {
                    user_message: user_message.to_string(),
                    tool_calls: Vec::new(),
                    tool_results: Vec::new(),
                    final_message: text,
                    tool_executed: false,
                });
            }
            Decision::ToolCallsRequested(calls) => calls,
        };

        transition(&mut state, TurnState::ExecutingTools(calls.len()));
        // Calls are independent; join_all keeps results in request order
        let outcomes = join_all(calls.iter().map(|call| self.run_call(call))).await;
        let results = outcomes.into_iter().collect::<Result<Vec<_>, AuthRequired>>()?;

        let failed = results.iter().filter(|r| r.output.is_error()).count();
        info!(
            "Executed {} tool call(s), {} failed. Calling LLM with tool outputs for final response.",
            results.len(),
            failed
        );

        transition(&mut state, TurnState::AwaitingSummary);
        let final_message = self.llm.summarize(user_message, &calls, &results).await?;

        transition(&mut state, TurnState::Done { tool_executed: true });
        Ok(ChatExchange {
            user_message: user_message.to_string(),
            tool_calls: calls,
            tool_results: results,
            final_message,
            tool_executed: true,
        })
    }

    async fn run_call(&self, call: &ToolCall) -> Result<ToolOutput, AuthRequired> {
        let output = match parse_arguments(&call.arguments) {
            Ok(args) => {
                info!("Executing tool: {} (call {})", call.name, call.id);
                self.registry.execute(&call.name, args).await?
            }
            Err(reason) => {
                let message = format!(
                    "Error executing tool '{}': {}. Raw Arguments: {}",
                    call.name, reason, call.arguments
                );
                error!("{}", message);
                ToolResult::error(message)
            }
        };

        Ok(ToolOutput {
            tool_call_id: call.id.clone(),
            output,
        })
    }
}

fn transition(state: &mut TurnState, next: TurnState) {
    debug!("Turn state {} -> {}", state, next);
    *state = next;
}

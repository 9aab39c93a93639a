/// Google Workspace Agent
///
/// A natural-language agent that turns chat messages into Google Workspace
/// actions. Each turn asks a completion provider whether tools are needed,
/// runs the requested tools against Gmail, Calendar, Docs, Sheets and Forms,
/// and asks the provider again to summarize what happened.
///
/// # Features
///
/// - Two-phase decide/summarize protocol over a pluggable completion provider
/// - Static tool catalog with schema checks before dispatch
/// - Uniform `{status, message, details}` result envelope for every action
/// - OAuth credential record with serialized refresh
/// - HTTP API (axum) and a command-line interface
///
/// # Testing
///
/// Unit tests live beside the code; integration tests under `tests/` drive the
/// domain servers, credential manager and completion client against mockito.
pub mod auth;
pub mod config;
pub mod errors;
pub mod google;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod server;
pub mod servers;
pub mod tools;

// Re-export key types for use in tests and the binary
pub use crate::auth::{Credential, CredentialManager, OAuthClient};
pub use crate::config::{ApiEndpoints, Config};
pub use crate::errors::{AgentError, AuthRequired};
pub use crate::logging::setup_logging;
pub use crate::orchestrator::{ChatExchange, ChatResponse, Orchestrator};
pub use crate::tools::{ToolCall, ToolDefinition, ToolOutput, ToolRegistry, ToolResult, ToolStatus};

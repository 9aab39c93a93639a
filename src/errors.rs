use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Environment error: {0}")]
    EnvError(#[from] env::VarError),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },

    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
}

/// Errors from reading or writing the persisted credential record.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credential record at {0}")]
    NotFound(PathBuf),

    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// No usable credential exists. The caller must re-run the authorization flow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Authentication required: {0}")]
pub struct AuthRequired(pub String);

#[derive(Debug, Error)]
pub enum TokenExchangeError {
    #[error("Token endpoint rejected the request. Status: {status}, Error: {body}")]
    Rejected { status: u16, body: String },

    #[error("Token endpoint unreachable: {0}")]
    Network(String),

    #[error("Failed to parse token response: {0}")]
    Parse(String),
}

// Faults from a Workspace API family
#[derive(Debug, Error)]
pub enum WorkspaceApiError {
    #[error("Google API error: {0}")]
    ApiError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit error: {0}")]
    RateLimitError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unexpected response format: {0}")]
    FormatError(String),
}

pub type WorkspaceResult<T> = std::result::Result<T, WorkspaceApiError>;

/// Failure of a single tool call.
///
/// Everything except `AuthRequired` is converted into an error envelope at the
/// domain server boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Api(#[from] WorkspaceApiError),

    #[error(transparent)]
    AuthRequired(#[from] AuthRequired),
}

/// Completion API failures. These are fatal to the chat turn.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Completion request failed: {0}")]
    Request(String),

    #[error("Completion request timed out")]
    Timeout,

    #[error("Completion API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse completion response: {0}")]
    Parse(String),
}

/// The only errors an orchestration turn surfaces to the transport layer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    AuthRequired(#[from] AuthRequired),

    #[error("LLM provider failure: {0}")]
    Provider(#[from] LlmError),
}

/// Errors raised while wiring the application together at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

use crate::errors::ConfigError;
use dotenv::dotenv;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// OAuth endpoints
pub const OAUTH_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

// Workspace API base URLs
pub const GMAIL_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";
pub const CALENDAR_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DOCS_API_BASE_URL: &str = "https://docs.googleapis.com/v1";
pub const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const FORMS_API_BASE_URL: &str = "https://forms.googleapis.com/v1";

pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/forms.body",
    "https://www.googleapis.com/auth/forms.responses.readonly",
];

/// Base URLs of the five Workspace API families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub gmail: String,
    pub calendar: String,
    pub docs: String,
    pub sheets: String,
    pub forms: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            gmail: GMAIL_API_BASE_URL.to_string(),
            calendar: CALENDAR_API_BASE_URL.to_string(),
            docs: DOCS_API_BASE_URL.to_string(),
            sheets: SHEETS_API_BASE_URL.to_string(),
            forms: FORMS_API_BASE_URL.to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Points every API family at the same base URL (local mock servers).
    pub fn uniform(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            gmail: base.clone(),
            calendar: base.clone(),
            docs: base.clone(),
            sheets: base.clone(),
            forms: base,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_path: PathBuf,
    pub tool_definition_path: PathBuf,
    pub llm_provider: String,
    pub llm_model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub request_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub log_level: String,
    pub log_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file if present
        // If DOTENV_PATH is set, use that path, otherwise use default
        if let Ok(path) = env::var("DOTENV_PATH") {
            let _ = dotenv::from_path(path);
        } else {
            let _ = dotenv();
        }

        debug!("Loading agent configuration from environment");

        let client_id = required("GOOGLE_CLIENT_ID")?;
        let client_secret = required("GOOGLE_CLIENT_SECRET")?;

        let scopes = match env::var("GOOGLE_SCOPES") {
            Ok(raw) => raw.split_whitespace().map(str::to_string).collect(),
            Err(_) => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let llm_provider = optional("LLM_PROVIDER", "openai").to_lowercase();
        let openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        if llm_provider == "openai" && openai_api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()));
        }

        let config = Config {
            client_id,
            client_secret,
            redirect_uri: optional(
                "GOOGLE_REDIRECT_URI",
                "http://localhost:8000/api/v1/auth/callback",
            ),
            scopes,
            token_path: PathBuf::from(optional("TOKEN_PATH", "credentials/token.json")),
            tool_definition_path: PathBuf::from(optional(
                "TOOL_DEFINITION_PATH",
                "mcp_config/tool_definitions.json",
            )),
            llm_provider,
            llm_model: optional("LLM_MODEL", "gpt-4o"),
            openai_api_key,
            openai_base_url: optional("OPENAI_BASE_URL", OPENAI_API_BASE_URL),
            request_timeout: Duration::from_secs(parsed("REQUEST_TIMEOUT_SECS", 30)?),
            host: optional("HOST", "0.0.0.0"),
            port: parsed("PORT", 8000)?,
            frontend_url: optional("FRONTEND_URL", "http://localhost:5173"),
            log_level: optional("LOG_LEVEL", "info"),
            log_file: optional("LOG_FILE", "logs/app.log"),
        };

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    pub fn endpoints(&self) -> ApiEndpoints {
        ApiEndpoints::default()
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

//! HTTP surface: chat endpoint plus the OAuth authorization routes.

use crate::auth::{CredentialManager, OAuthClient};
use crate::config::Config;
use crate::errors::{AgentError, StartupError};
use crate::google::build_http_client;
use crate::llm::build_provider;
use crate::orchestrator::{ChatResponse, Orchestrator};
use crate::servers::default_servers;
use crate::tools::ToolRegistry;
use axum::extract::{Json, Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{error, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub credentials: Arc<CredentialManager>,
    pub http: Client,
    pub frontend_url: String,
    pending_states: Arc<Mutex<HashSet<String>>>,
    authorized: Arc<Notify>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        credentials: Arc<CredentialManager>,
        http: Client,
        frontend_url: &str,
    ) -> Self {
        Self {
            orchestrator,
            credentials,
            http,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            pending_states: Arc::new(Mutex::new(HashSet::new())),
            authorized: Arc::new(Notify::new()),
        }
    }

    /// Resolves once an authorization callback has stored a credential.
    pub async fn wait_for_authorization(&self) {
        self.authorized.notified().await
    }

    /// Starts an authorization attempt and returns the consent page URL.
    pub fn begin_authorization(&self) -> Result<String, url::ParseError> {
        let state = new_oauth_state();
        let url = self.credentials.oauth().authorization_url(&state)?;
        if let Ok(mut pending) = self.pending_states.lock() {
            pending.insert(state);
        }
        Ok(url)
    }

    fn take_state(&self, state: &str) -> bool {
        self.pending_states
            .lock()
            .map(|mut pending| pending.remove(state))
            .unwrap_or(false)
    }
}

fn new_oauth_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Wires configuration into a ready-to-serve state.
pub fn build_state(config: &Config) -> Result<AppState, StartupError> {
    let http = build_http_client(config.request_timeout)?;

    let credentials = Arc::new(CredentialManager::new(
        config.token_path.clone(),
        OAuthClient::from_config(config),
        http.clone(),
    ));

    let servers = default_servers(credentials.clone(), &config.endpoints(), http.clone());
    let registry = Arc::new(ToolRegistry::new(&config.tool_definition_path, servers));
    let llm = build_provider(config, http.clone())?;
    let orchestrator = Arc::new(Orchestrator::new(llm, registry));

    Ok(AppState::new(orchestrator, credentials, http, &config.frontend_url))
}

/// Transport-level error: rendered as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Internal(String),
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::AuthRequired(e) => ApiError::Unauthorized(e.to_string()),
            AgentError::Provider(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, format!("Unauthorized: {}", msg)),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal Server Error: {}", msg),
            ),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Google Workspace Agent API is running." }))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    match state.orchestrator.orchestrate(&request.message).await {
        Ok(exchange) => Ok(Json(exchange.into())),
        Err(e) => {
            error!("Error processing chat message: {}", e);
            Err(e.into())
        }
    }
}

async fn login(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let url = state.begin_authorization().map_err(|e| {
        error!("Failed to build authorization URL: {}", e);
        ApiError::Internal("Authentication service initialization failed.".to_string())
    })?;
    info!("Redirecting user to Google for authorization.");
    Ok(Redirect::to(&url))
}

async fn callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Redirect {
    match complete_authorization(&state, params).await {
        Ok(()) => {
            state.authorized.notify_one();
            Redirect::to(&format!("{}/success", state.frontend_url))
        }
        Err(reason) => {
            error!("Google OAuth callback failed: {}", reason);
            Redirect::to(&format!(
                "{}/error?message=Authorization_Failed",
                state.frontend_url
            ))
        }
    }
}

async fn complete_authorization(state: &AppState, params: CallbackParams) -> Result<(), String> {
    if let Some(error) = params.error {
        return Err(format!("authorization denied: {}", error));
    }
    let returned_state = params.state.ok_or("missing state parameter")?;
    if !state.take_state(&returned_state) {
        return Err("unknown or reused state parameter".to_string());
    }
    let code = params.code.ok_or("missing code parameter")?;

    let credential = state
        .credentials
        .oauth()
        .exchange_code(&state.http, &code)
        .await
        .map_err(|e| e.to_string())?;
    state.credentials.store(&credential).map_err(|e| e.to_string())?;

    info!(
        "Successfully obtained and stored credentials at {}",
        state.credentials.path().display()
    );
    Ok(())
}

async fn auth_status(State(state): State<AppState>) -> Response {
    if state.credentials.exists() {
        Json(json!({
            "status": "authenticated",
            "message": "Token file found. Ready to use Google APIs."
        }))
        .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Not authenticated. token.json file not found." })),
        )
            .into_response()
    }
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!("FRONTEND_URL '{}' is not a valid origin ({}); CORS disabled", frontend_url, e);
            layer
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.frontend_url);
    Router::new()
        .route("/", get(root))
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/auth/login", get(login))
        .route("/api/v1/auth/callback", get(callback))
        .route("/api/v1/auth/status", get(auth_status))
        .layer(cors)
        .with_state(state)
}

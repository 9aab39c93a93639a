//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use workspace_agent::servers::default_servers;
use workspace_agent::tools::ToolArgs;
use workspace_agent::{ApiEndpoints, Credential, CredentialManager, OAuthClient, ToolRegistry};

pub const CATALOG_PATH: &str = "mcp_config/tool_definitions.json";
pub const ACCESS_TOKEN: &str = "test-access-token";

pub fn oauth_client(token_url: &str) -> OAuthClient {
    OAuthClient {
        client_id: "test_client_id".to_string(),
        client_secret: "test_client_secret".to_string(),
        redirect_uri: "http://localhost:8000/api/v1/auth/callback".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/gmail.modify".to_string()],
        auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_url: token_url.to_string(),
    }
}

pub fn credential(access_token: &str, expires_in_secs: i64, refresh_token: Option<&str>) -> Credential {
    Credential {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expiry: Some(Utc::now() + Duration::seconds(expires_in_secs)),
        scopes: vec!["https://www.googleapis.com/auth/gmail.modify".to_string()],
    }
}

/// A manager whose record holds `credential`, refreshing against `token_url`.
pub fn manager_with(dir: &Path, token_url: &str, credential: Option<&Credential>) -> Arc<CredentialManager> {
    let manager = CredentialManager::new(dir.join("token.json"), oauth_client(token_url), Client::new());
    if let Some(credential) = credential {
        manager.store(credential).unwrap();
    }
    Arc::new(manager)
}

/// Registry over the real catalog with every API family pointed at `base_url`.
pub fn registry(base_url: &str, credentials: Arc<CredentialManager>) -> ToolRegistry {
    let servers = default_servers(credentials, &ApiEndpoints::uniform(base_url), Client::new());
    ToolRegistry::new(CATALOG_PATH, servers)
}

/// Registry whose credential is fresh and needs no token endpoint.
pub fn authorized_registry(base_url: &str, dir: &Path) -> ToolRegistry {
    let fresh = credential(ACCESS_TOKEN, 3600, Some("refresh"));
    registry(base_url, manager_with(dir, "http://127.0.0.1:9/token", Some(&fresh)))
}

pub fn args(value: Value) -> ToolArgs {
    match value {
        Value::Object(map) => map,
        other => panic!("tool arguments must be an object, got {}", other),
    }
}

pub fn bearer() -> String {
    format!("Bearer {}", ACCESS_TOKEN)
}

//! Authorized transport for the Google Workspace REST APIs.
//!
//! Injects the bearer token, maps Google's error envelope onto
//! [`WorkspaceApiError`], and retries a timed-out GET once.

use crate::errors::{WorkspaceApiError, WorkspaceResult};
use log::{debug, error, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Builds the process-wide HTTP client. Every outbound call inherits its timeout.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
}

/// Google API HTTP client bound to one API family and one access token
#[derive(Clone)]
pub struct GoogleClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GoogleClient {
    pub fn new(http: Client, base_url: &str, access_token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> WorkspaceResult<Value> {
        let url = self.url(path);
        let request = || {
            self.http
                .get(&url)
                .query(query)
                .bearer_auth(&self.access_token)
        };

        match self.execute(request()).await {
            Err(WorkspaceApiError::Timeout(e)) => {
                warn!("GET {} timed out ({}), retrying once", path, e);
                self.execute(request()).await
            }
            other => other,
        }
    }

    pub async fn post(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> WorkspaceResult<Value> {
        let builder = self
            .http
            .post(self.url(path))
            .query(query)
            .bearer_auth(&self.access_token)
            .json(body);
        self.execute(builder).await
    }

    pub async fn put(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> WorkspaceResult<Value> {
        let builder = self
            .http
            .put(self.url(path))
            .query(query)
            .bearer_auth(&self.access_token)
            .json(body);
        self.execute(builder).await
    }

    pub async fn delete(&self, path: &str) -> WorkspaceResult<Value> {
        let builder = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.access_token);
        self.execute(builder).await
    }

    async fn execute(&self, builder: RequestBuilder) -> WorkspaceResult<Value> {
        let response = builder.send().await.map_err(map_transport_error)?;

        let status = response.status();
        debug!("Google API response status: {}", status);

        let body = response.text().await.map_err(map_transport_error)?;

        if status.is_success() {
            // Empty successful responses (e.g., DELETE)
            if body.trim().is_empty() {
                return Ok(Value::Object(serde_json::Map::new()));
            }
            return serde_json::from_str(&body).map_err(|e| {
                WorkspaceApiError::FormatError(format!("invalid JSON response: {}", e))
            });
        }

        let message = extract_error_message(&body, status);
        error!("Google API error: {}", message);

        Err(match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => WorkspaceApiError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => WorkspaceApiError::RateLimitError(message),
            _ => WorkspaceApiError::ApiError(message),
        })
    }
}

fn map_transport_error(e: reqwest::Error) -> WorkspaceApiError {
    if e.is_timeout() {
        WorkspaceApiError::Timeout(e.to_string())
    } else {
        WorkspaceApiError::NetworkError(e.to_string())
    }
}

/// Google APIs return errors as `{"error": {"code": 400, "message": "..."}}`.
fn extract_error_message(body: &str, status: StatusCode) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("error_description"))
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    match detail {
        Some(message) => format!("{} ({})", message, status.as_u16()),
        None if body.trim().is_empty() => format!("HTTP {}", status.as_u16()),
        None => format!("HTTP {}: {}", status.as_u16(), body.trim()),
    }
}

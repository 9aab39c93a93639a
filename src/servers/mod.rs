//! Domain action servers: one per Workspace API family.
//!
//! Each server exposes a fixed list of actions behind [`DomainServer`], obtains
//! its transport through a [`ServiceHandle`], and turns every failure except
//! [`AuthRequired`] into an error envelope.

pub mod calendar;
pub mod docs;
pub mod forms;
pub mod gmail;
pub mod sheets;

pub use calendar::CalendarServer;
pub use docs::DocsServer;
pub use forms::FormsServer;
pub use gmail::GmailServer;
pub use sheets::SheetsServer;

use crate::auth::CredentialManager;
use crate::config::ApiEndpoints;
use crate::errors::{AuthRequired, ToolError};
use crate::google::GoogleClient;
use crate::tools::{ToolArgs, ToolResult};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The capability every domain server implements.
#[async_trait]
pub trait DomainServer: Send + Sync {
    /// Tool-name prefix, e.g. `gmail`.
    fn domain(&self) -> &'static str;

    /// Action names accepted by [`execute`](DomainServer::execute).
    fn actions(&self) -> &'static [&'static str];

    /// Runs one action. Only a missing or unusable credential escapes as an error.
    async fn execute(&self, action: &str, args: ToolArgs) -> Result<ToolResult, AuthRequired>;
}

/// Lazily built, credential-aware client for one API family.
///
/// The cached client is reused only while the credential's access token is
/// unchanged; a refresh rebuilds it.
pub struct ServiceHandle {
    api: &'static str,
    base_url: String,
    http: Client,
    credentials: Arc<CredentialManager>,
    cached: RwLock<Option<GoogleClient>>,
}

impl ServiceHandle {
    pub fn new(
        api: &'static str,
        base_url: &str,
        http: Client,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        Self {
            api,
            base_url: base_url.to_string(),
            http,
            credentials,
            cached: RwLock::new(None),
        }
    }

    pub async fn client(&self) -> Result<GoogleClient, AuthRequired> {
        let credential = self.credentials.ensure_valid().await?;

        if let Some(client) = self.cached.read().await.as_ref() {
            if client.access_token() == credential.access_token {
                return Ok(client.clone());
            }
        }

        debug!("Building {} client for current credential", self.api);
        let client = GoogleClient::new(self.http.clone(), &self.base_url, credential.access_token);
        *self.cached.write().await = Some(client.clone());
        Ok(client)
    }
}

/// Converts an action outcome into the uniform envelope.
pub(crate) fn envelope(
    domain: &str,
    label: &str,
    outcome: Result<ToolResult, ToolError>,
) -> Result<ToolResult, AuthRequired> {
    match outcome {
        Ok(result) => Ok(result),
        Err(ToolError::AuthRequired(e)) => Err(e),
        Err(e) => {
            error!("[{}] Failed to {}: {}", domain, label, e);
            Ok(ToolResult::error(format!("Failed to {}. Details: {}", label, e)))
        }
    }
}

pub(crate) fn unknown_action(domain: &str, action: &str) -> Result<ToolResult, AuthRequired> {
    Ok(ToolResult::error(format!(
        "No action '{}' found on server '{}'",
        action, domain
    )))
}

/// Percent-encodes one URL path segment (ids, A1 ranges).
pub(crate) fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// The five Workspace servers wired to one credential manager.
pub fn default_servers(
    credentials: Arc<CredentialManager>,
    endpoints: &ApiEndpoints,
    http: Client,
) -> Vec<Arc<dyn DomainServer>> {
    vec![
        Arc::new(GmailServer::new(ServiceHandle::new(
            "gmail",
            &endpoints.gmail,
            http.clone(),
            credentials.clone(),
        ))),
        Arc::new(CalendarServer::new(ServiceHandle::new(
            "calendar",
            &endpoints.calendar,
            http.clone(),
            credentials.clone(),
        ))),
        Arc::new(DocsServer::new(ServiceHandle::new(
            "docs",
            &endpoints.docs,
            http.clone(),
            credentials.clone(),
        ))),
        Arc::new(SheetsServer::new(ServiceHandle::new(
            "sheets",
            &endpoints.sheets,
            http.clone(),
            credentials.clone(),
        ))),
        Arc::new(FormsServer::new(ServiceHandle::new(
            "forms",
            &endpoints.forms,
            http,
            credentials,
        ))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WorkspaceApiError;
    use crate::tools::ToolStatus;

    #[test]
    fn envelope_swallows_api_errors_but_not_auth() {
        let result = envelope(
            "gdocs",
            "read document",
            Err(WorkspaceApiError::NotFound("doc".to_string()).into()),
        )
        .unwrap();
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.message.starts_with("Failed to read document."));

        let auth = envelope(
            "gdocs",
            "read document",
            Err(AuthRequired("gone".to_string()).into()),
        );
        assert_eq!(auth, Err(AuthRequired("gone".to_string())));
    }

    #[test]
    fn segment_encodes_ranges() {
        assert_eq!(segment("Sheet1!A1:B2"), "Sheet1%21A1%3AB2");
    }
}

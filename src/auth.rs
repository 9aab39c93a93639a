use crate::config::{Config, OAUTH_AUTH_URL, OAUTH_TOKEN_URL};
use crate::errors::{AuthRequired, CredentialError, TokenExchangeError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use url::Url;

/// Tokens within this many seconds of expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// The OAuth token bundle for the single connected Google account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// A credential with no expiry recorded is treated as valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now + ChronoDuration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn from_token_response(response: TokenResponse, previous: Option<&Credential>) -> Self {
        let expiry = response.expires_in.and_then(|secs| {
            let expiry = i64::try_from(secs)
                .ok()
                .and_then(ChronoDuration::try_seconds)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
            if expiry.is_none() {
                warn!("Ignoring out-of-range expires_in of {} seconds", secs);
            }
            expiry
        });

        // Google omits the refresh token on refresh responses; keep the one we had
        let refresh_token = response
            .refresh_token
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        let scopes = match response.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => previous.map(|p| p.scopes.clone()).unwrap_or_default(),
        };

        Credential {
            access_token: response.access_token,
            refresh_token,
            expiry,
            scopes,
        }
    }
}

// Token response for OAuth2 (both code exchange and refresh)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: String,
}

/// OAuth client registration plus the endpoints it talks to.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            auth_url: OAUTH_AUTH_URL.to_string(),
            token_url: OAUTH_TOKEN_URL.to_string(),
        }
    }

    /// Builds the consent page URL. Offline access makes Google issue a refresh token.
    pub fn authorization_url(&self, state: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.auth_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("include_granted_scopes", "true")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.into())
    }

    pub async fn exchange_code(
        &self,
        http: &Client,
        code: &str,
    ) -> Result<Credential, TokenExchangeError> {
        debug!("Exchanging authorization code at {}", self.token_url);
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self.post_token_request(http, &params).await?;
        Ok(Credential::from_token_response(response, None))
    }

    async fn refresh(
        &self,
        http: &Client,
        current: &Credential,
        refresh_token: &str,
    ) -> Result<Credential, TokenExchangeError> {
        // Securely log truncated credential information - never log full credentials
        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Refreshing token with client_id {} and refresh_token {}",
                truncate_secret(&self.client_id),
                truncate_secret(refresh_token)
            );
        }

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.post_token_request(http, &params).await?;
        Ok(Credential::from_token_response(response, Some(current)))
    }

    async fn post_token_request(
        &self,
        http: &Client,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, TokenExchangeError> {
        let response = http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| TokenExchangeError::Network(e.to_string()))?;

        let status = response.status();
        debug!("Token response status: {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no response body>".to_string());
            error!("Token request failed. Status: {}, Error: {}", status, body);
            return Err(TokenExchangeError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| TokenExchangeError::Network(e.to_string()))?;

        serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse token response: {}", e);
            TokenExchangeError::Parse(e.to_string())
        })
    }
}

/// Owner of the persisted credential record.
///
/// Every Workspace call obtains its access token through [`ensure_valid`],
/// which holds a lock across load, refresh and persist so concurrent callers
/// never race two refresh exchanges against each other.
///
/// [`ensure_valid`]: CredentialManager::ensure_valid
pub struct CredentialManager {
    path: PathBuf,
    oauth: OAuthClient,
    http: Client,
    refresh_lock: Mutex<()>,
}

impl CredentialManager {
    pub fn new(path: impl Into<PathBuf>, oauth: OAuthClient, http: Client) -> Self {
        Self {
            path: path.into(),
            oauth,
            http,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the persisted record.
    pub fn load(&self) -> Result<Credential, CredentialError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CredentialError::NotFound(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overwrites the persisted record via write-temp-then-rename.
    pub fn store(&self, credential: &Credential) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(serde_json::to_string_pretty(credential)?.as_bytes())?;
            file.sync_all()?;
        }
        restrict_permissions(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)?;

        info!("Google credentials saved to {}", self.path.display());
        Ok(())
    }

    /// Deletes the persisted record, forcing re-authorization.
    pub fn invalidate(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => warn!("Deleted credential record at {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!("Failed to delete credential record: {}", e),
        }
    }

    /// Returns an unexpired credential, refreshing it if needed.
    pub async fn ensure_valid(&self) -> Result<Credential, AuthRequired> {
        let _guard = self.refresh_lock.lock().await;

        // Re-read under the lock so a refresh done by another caller is observed
        let credential = match self.load() {
            Ok(credential) => credential,
            Err(CredentialError::NotFound(_)) => {
                debug!("No credential record found");
                return Err(AuthRequired(
                    "No Google credentials found. Please authorize the application.".to_string(),
                ));
            }
            Err(e) => {
                error!("Unreadable credential record: {}", e);
                self.invalidate();
                return Err(AuthRequired(format!(
                    "Stored Google credentials could not be read: {}",
                    e
                )));
            }
        };

        debug!(
            "Token status check - have token: {}, expired: {}",
            !credential.access_token.is_empty(),
            credential.is_expired()
        );

        if !credential.access_token.is_empty() && !credential.is_expired() {
            debug!("Using existing token");
            return Ok(credential);
        }

        let refresh_token = match credential.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                warn!("Credential expired and no refresh token is available");
                self.invalidate();
                return Err(AuthRequired(
                    "Google credentials expired and cannot be refreshed.".to_string(),
                ));
            }
        };

        info!("Refreshing expired Google token");
        match self.oauth.refresh(&self.http, &credential, &refresh_token).await {
            Ok(refreshed) => {
                if let Err(e) = self.store(&refreshed) {
                    // The token is still good for this process; the next load refreshes again
                    error!("Failed to persist refreshed credential: {}", e);
                }
                debug!(
                    "Token refreshed successfully, expires at {:?}, token {}",
                    refreshed.expiry,
                    truncate_secret(&refreshed.access_token)
                );
                Ok(refreshed)
            }
            Err(TokenExchangeError::Network(e)) => {
                // The grant may still be good; keep the record
                error!("Token refresh could not reach the token endpoint: {}", e);
                Err(AuthRequired(format!(
                    "Could not refresh Google credentials: {}",
                    e
                )))
            }
            Err(e) => {
                error!("Token refresh rejected: {}", e);
                self.invalidate();
                Err(AuthRequired(format!(
                    "Google credentials were rejected and have been cleared: {}",
                    e
                )))
            }
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

pub(crate) fn truncate_secret(secret: &str) -> String {
    if secret.len() > 8 && secret.is_char_boundary(4) {
        format!("{}...", &secret[..4])
    } else {
        "<short>".to_string()
    }
}

//! Google credentials.
//!
//! Reads can use either an API key (`?key=`) or an OAuth bearer token;
//! writes always need a bearer token. Bearer tokens come from the
//! refresh-token grant against `[auth].token_url` and are cached until
//! shortly before they expire.
//!
//! | Env var (default name) | Used for |
//! |------------------------|----------|
//! | `GOOGLE_CLIENT_ID` | refresh-token grant |
//! | `GOOGLE_CLIENT_SECRET` | refresh-token grant |
//! | `GOOGLE_REFRESH_TOKEN` | refresh-token grant; OAuth is off when unset |
//! | `[sheet].api_key_env` / `[drive].api_key_env` | read-only API key |

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::AuthConfig;

/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Exchanges a long-lived refresh token for short-lived access tokens.
pub struct OAuthTokenProvider {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuthTokenProvider {
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            cached: Mutex::new(None),
        }
    }

    /// Build a provider from the env vars named in `[auth]`.
    ///
    /// Returns `Ok(None)` when no refresh token is set; a refresh token
    /// without client credentials is an error.
    pub fn from_env(auth: &AuthConfig, client: reqwest::Client) -> Result<Option<Self>> {
        let Ok(refresh_token) = std::env::var(&auth.refresh_token_env) else {
            return Ok(None);
        };
        let client_id = std::env::var(&auth.client_id_env)
            .with_context(|| format!("{} environment variable not set", auth.client_id_env))?;
        let client_secret = std::env::var(&auth.client_secret_env)
            .with_context(|| format!("{} environment variable not set", auth.client_secret_env))?;
        Ok(Some(Self::new(
            client,
            auth.token_url.clone(),
            client_id,
            client_secret,
            refresh_token,
        )))
    }

    /// A valid access token, refreshing if the cached one is stale.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.access_token.clone());
        }

        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach token endpoint {}", self.token_url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Token refresh failed (HTTP {}): {}",
                status,
                google_error_message(&body).unwrap_or_else(|| status.to_string())
            );
        }

        let token: TokenResponse = resp
            .json()
            .await
            .context("Token endpoint returned an unexpected body")?;
        debug!(expires_in = token.expires_in, "refreshed access token");

        let fresh = CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        let access = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access)
    }
}

/// How requests to Google APIs are authorized.
#[derive(Clone, Default)]
pub struct GoogleCredentials {
    pub api_key: Option<String>,
    pub oauth: Option<Arc<OAuthTokenProvider>>,
}

impl GoogleCredentials {
    pub fn new(api_key_env: Option<&str>, oauth: Option<Arc<OAuthTokenProvider>>) -> Self {
        let api_key = api_key_env
            .and_then(|name| std::env::var(name).ok())
            .filter(|k| !k.trim().is_empty());
        Self { api_key, oauth }
    }

    pub fn has_oauth(&self) -> bool {
        self.oauth.is_some()
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.oauth.is_some()
    }

    /// Attach a bearer token when OAuth is available, else the API key.
    pub async fn authorize_read(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        if let Some(oauth) = &self.oauth {
            return Ok(req.bearer_auth(oauth.access_token().await?));
        }
        if let Some(key) = &self.api_key {
            return Ok(req.query(&[("key", key.as_str())]));
        }
        bail!("no Google credentials configured (set an API key or an OAuth refresh token)")
    }

    /// Attach a bearer token; writes are not possible with an API key.
    pub async fn authorize_write(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        match &self.oauth {
            Some(oauth) => Ok(req.bearer_auth(oauth.access_token().await?)),
            None => bail!("No access token available: writes need an OAuth refresh token"),
        }
    }
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GoogleErrorDetail {
    Api { message: String },
    OAuth(String),
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error_description: String,
}

/// Extract Google's own error message from a response body.
///
/// Handles the API shape `{"error":{"message":...}}` and the OAuth shape
/// `{"error":"invalid_grant","error_description":...}`.
pub fn google_error_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<OAuthErrorBody>(body) {
        return Some(parsed.error_description);
    }
    match serde_json::from_str::<GoogleErrorBody>(body).ok()?.error {
        GoogleErrorDetail::Api { message } => Some(message),
        GoogleErrorDetail::OAuth(code) => Some(code),
    }
}

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use super::refresh;
use super::types::Session;
use crate::config::Config;
use crate::error::ApiError;

/// Authentication manager
/// Owns the session token and fetches a new one only when necessary
pub struct AuthManager {
    /// Application ID (logged; the secret never is)
    application_id: String,

    /// Fully built authorization endpoint URL
    authorization_url: Url,

    /// HTTP client for token requests
    client: Client,

    /// Current token, its expiry and the negotiated API version
    session: RwLock<Session>,

    /// Serialises token fetches so concurrent callers share one result
    fetch_lock: Mutex<()>,

    /// Instance-wide "re-authentication already attempted" flag
    auth_retry: AtomicBool,
}

impl AuthManager {
    /// Create a new AuthManager; no network activity happens here
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let authorization_url = refresh::authorization_url(
            &config.base_url(),
            &config.application_id,
            &config.secret,
        )
        .map_err(|e| ApiError::ConfigError(format!("{:#}", e)))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            application_id: config.application_id.clone(),
            authorization_url,
            client,
            session: RwLock::new(Session::default()),
            fetch_lock: Mutex::new(()),
            auth_retry: AtomicBool::new(false),
        })
    }

    /// Seed the session without a network fetch
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn seed_session(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        api_version: Option<&str>,
    ) {
        let mut session = self.session.write().await;
        session.store(super::types::TokenData {
            token: token.to_string(),
            expires_at,
            api_version: api_version.map(String::from),
        });
    }

    async fn cached_token(&self) -> Option<String> {
        let session = self.session.read().await;
        session.valid_token(Utc::now()).map(String::from)
    }

    /// Get a valid token, fetching a new one if none is cached or it expired
    pub async fn get_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _guard = self.fetch_lock.lock().await;

        // Another caller may have fetched while we waited for the lock
        if let Some(token) = self.cached_token().await {
            tracing::debug!("Using token fetched by a concurrent caller");
            return Ok(token);
        }

        self.fetch_locked().await
    }

    /// Fetch a new token unconditionally, bypassing the cache
    pub async fn fetch_new_token(&self) -> Result<String, ApiError> {
        let _guard = self.fetch_lock.lock().await;
        self.fetch_locked().await
    }

    /// Replace a token the server rejected
    ///
    /// Skips the fetch when a concurrent recovery already swapped `stale` for a
    /// newer, still valid token.
    pub async fn reauthenticate(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.fetch_lock.lock().await;

        if let Some(current) = self.cached_token().await {
            if Some(current.as_str()) != stale {
                tracing::debug!("Token already replaced by a concurrent re-authentication");
                return Ok(current);
            }
        }

        self.fetch_locked().await
    }

    /// Must be called with `fetch_lock` held
    async fn fetch_locked(&self) -> Result<String, ApiError> {
        let token_data = refresh::fetch_token(
            &self.client,
            self.authorization_url.clone(),
            &self.application_id,
        )
        .await
        .map_err(|e| {
            tracing::error!("Authentication error: {:#}", e);
            ApiError::AuthError(format!("{:#}", e))
        })?;

        let token = token_data.token.clone();
        {
            let mut session = self.session.write().await;
            session.store(token_data);
        }
        self.auth_retry.store(false, Ordering::SeqCst);

        tracing::debug!(token = %token_prefix(&token), "Session updated");
        Ok(token)
    }

    /// API version learned from the most recent successful fetch
    pub async fn get_api_version(&self) -> Option<String> {
        let session = self.session.read().await;
        session.api_version().map(String::from)
    }

    /// Expiration of the stored token
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        let session = self.session.read().await;
        session.expires_at()
    }

    /// Whether a re-authentication was already attempted in this cycle
    pub fn has_retried(&self) -> bool {
        self.auth_retry.load(Ordering::SeqCst)
    }

    /// Record that a re-authentication was attempted
    pub fn mark_retry(&self) {
        self.auth_retry.store(true, Ordering::SeqCst);
    }

    /// Reset after a successful response so a later failure can recover again
    pub fn reset_auth_retry(&self) {
        self.auth_retry.store(false, Ordering::SeqCst);
    }
}

/// Short, log-safe prefix of a token
pub(crate) fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}...", prefix)
}

// Authentication types

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Response body of `GET /authorization/{applicationId}/{secret}`
///
/// The canonical field is `token`; `authorization` is accepted as an alias.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(default, alias = "authorization")]
    pub token: Option<String>,

    #[serde(default)]
    pub expiration: Option<String>,

    #[serde(default)]
    pub api: Option<ApiInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub version: Option<String>,
}

/// Token data parsed from a successful authorization response
#[derive(Debug, Clone, PartialEq)]
pub struct TokenData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub api_version: Option<String>,
}

/// In-memory record of the current token
///
/// `token` and `expires_at` are only ever written together.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    api_version: Option<String>,
}

impl Session {
    /// Token that is still valid at `now`
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(exp)) if now < exp => Some(token.as_str()),
            _ => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    pub fn store(&mut self, data: TokenData) {
        self.token = Some(data.token);
        self.expires_at = Some(data.expires_at);
        self.api_version = data.api_version;
    }
}

// Token fetch logic

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};

use super::types::{AuthResponse, TokenData};

/// Path segment that identifies the authorization endpoint
pub const AUTHORIZATION_SEGMENT: &str = "/authorization/";

/// Build `{base_url}/authorization/{application_id}/{secret}`
pub fn authorization_url(base_url: &str, application_id: &str, secret: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Base URL cannot carry a path: {}", base_url))?
        .pop_if_empty()
        .push("authorization")
        .push(application_id)
        .push(secret);
    Ok(url)
}

/// Whether a request path targets the authorization endpoint itself
pub fn is_authorization_path(path: &str) -> bool {
    path.contains(AUTHORIZATION_SEGMENT)
}

/// Fetch a fresh token from the authorization endpoint
pub async fn fetch_token(client: &Client, url: Url, application_id: &str) -> Result<TokenData> {
    tracing::info!(application_id = %application_id, "Fetching new Digiventures token...");

    // The URL carries the secret, so it is stripped from every transport error
    let response = client
        .get(url)
        .send()
        .await
        .map_err(reqwest::Error::without_url)
        .context("Failed to send authorization request")?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e.without_url()));
        anyhow::bail!("Authorization request failed: {} - {}", status, error_text);
    }

    let data: AuthResponse = response
        .json()
        .await
        .map_err(reqwest::Error::without_url)
        .context("Failed to parse authorization response")?;

    let token_data = parse_auth_response(data)?;

    tracing::info!(
        expires = %token_data.expires_at.to_rfc3339(),
        api_version = token_data.api_version.as_deref().unwrap_or("-"),
        "Token fetched"
    );

    Ok(token_data)
}

/// Validate an authorization response into token data
pub fn parse_auth_response(data: AuthResponse) -> Result<TokenData> {
    let token = data
        .token
        .filter(|t| !t.is_empty())
        .context("Authentication response missing authorization token")?;

    let expiration = data
        .expiration
        .context("Authentication response missing expiration")?;
    let expires_at = DateTime::parse_from_rfc3339(&expiration)
        .with_context(|| format!("Invalid expiration timestamp: {}", expiration))?
        .with_timezone(&Utc);

    let api_version = data
        .api
        .and_then(|api| api.version)
        .filter(|v| !v.is_empty());

    Ok(TokenData {
        token,
        expires_at,
        api_version,
    })
}

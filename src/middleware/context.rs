use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;

use crate::auth::is_authorization_path;
use crate::error::ApiError;

/// Query parameter that carries the token on every non-auth request
pub const TOKEN_PARAM: &str = "authorization";

/// Outbound request descriptor flowing through the pipeline
///
/// Stages only touch the query set (token injection) and the per-request
/// re-authentication marker. Body and headers belong to the caller.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    token: Option<String>,
    reauth_attempted: bool,
    request_id: String,
}

impl RequestContext {
    /// Create a context; a `?query` suffix on the path is split into parameters
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let query = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method,
            path,
            query,
            body: None,
            headers: HeaderMap::new(),
            token: None,
            reauth_attempted: false,
            request_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Attach a JSON body
    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to serialize body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Attach a header, replacing any previous value
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set a query parameter, overwriting every existing value under `name`
    pub fn set_query(&mut self, name: &str, value: &str) {
        self.query.retain(|(k, _)| k != name);
        self.query.push((name.to_string(), value.to_string()));
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attach the token as the `authorization` query parameter
    pub fn set_token(&mut self, token: String) {
        self.set_query(TOKEN_PARAM, &token);
        self.token = Some(token);
    }

    /// Token the pipeline attached, if any
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn targets_authorization_endpoint(&self) -> bool {
        is_authorization_path(&self.path)
    }

    pub fn reauth_attempted(&self) -> bool {
        self.reauth_attempted
    }

    pub fn mark_reauth_attempted(&mut self) {
        self.reauth_attempted = true;
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Absolute URL of the request against `base_url`
    pub fn url(&self, base_url: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), self.path))
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid request URL: {}", e)))?;

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }

        Ok(url)
    }
}

use reqwest::{Client, Response, StatusCode, Url};

use super::context::RequestContext;
use crate::error::ApiError;

/// Classified result of one dispatch
#[derive(Debug)]
pub enum Outcome {
    /// 2xx response
    Success(Response),
    /// Non-2xx response; `message` is the response body
    Status { status: StatusCode, message: String },
    /// No response at all
    Network { kind: &'static str, message: String },
}

impl Outcome {
    /// 401 and 500 trigger the re-authentication protocol
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Outcome::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED
                    || *status == StatusCode::INTERNAL_SERVER_ERROR
        )
    }

    /// Surface the outcome to the caller
    pub fn into_result(self) -> Result<Response, ApiError> {
        match self {
            Outcome::Success(response) => Ok(response),
            Outcome::Status { status, message } => Err(ApiError::DigiApiError {
                status: status.as_u16(),
                message,
            }),
            Outcome::Network { kind, message } => Err(ApiError::Transport { kind, message }),
        }
    }
}

/// Send the request through the underlying transport
pub async fn dispatch(
    client: &Client,
    url: Url,
    ctx: &RequestContext,
) -> Result<Response, reqwest::Error> {
    let mut builder = client
        .request(ctx.method().clone(), url)
        .headers(ctx.headers().clone());

    if let Some(body) = ctx.body() {
        builder = builder.json(body);
    }

    builder.send().await
}

/// Classify a dispatch result, reading the body of error responses
///
/// Transport errors drop their URL, which carries the token query parameter.
pub async fn classify(result: Result<Response, reqwest::Error>) -> Outcome {
    match result {
        Ok(response) if response.status().is_success() => Outcome::Success(response),
        Ok(response) => {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e.without_url()));
            Outcome::Status { status, message }
        }
        Err(e) => Outcome::Network {
            kind: error_kind(&e),
            message: e.without_url().to_string(),
        },
    }
}

/// Categorize a transport error for diagnostics
pub fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}

use anyhow::Context;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AuthManager;
use crate::config::{Config, ReauthScope};
use crate::error::ApiError;
use crate::middleware::{self, Outcome, RequestContext, RetryPolicy};

/// HTTP client for the Digiventures API with token injection and retry logic
pub struct DigiHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Authentication manager
    auth_manager: Arc<AuthManager>,

    /// Origin every request path is joined to
    base_url: String,

    /// Generic retry policy for transient failures
    retry_policy: RetryPolicy,

    /// Where the one-shot re-authentication marker lives
    reauth_scope: ReauthScope,
}

impl DigiHttpClient {
    /// Create a new HTTP client
    pub fn new(config: &Config, auth_manager: Arc<AuthManager>) -> Result<Self, ApiError> {
        // Redirects would carry the token query parameter to another origin
        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            auth_manager,
            base_url: config.base_url(),
            retry_policy: RetryPolicy::from_config(config),
            reauth_scope: config.reauth_scope,
        })
    }

    /// Execute a request through the full pipeline
    /// Automatically handles:
    /// - token injection (except for the authorization endpoint)
    /// - network errors on idempotent methods and 5xx: exponential backoff
    /// - 401/500 after retries: one re-authentication and one more attempt
    pub async fn execute(&self, mut ctx: RequestContext) -> Result<Response, ApiError> {
        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            "Sending HTTP request"
        );

        middleware::inject_auth(&self.auth_manager, &mut ctx).await?;

        let outcome = match self.send_with_retry(&ctx).await? {
            Outcome::Success(response) => return Ok(self.on_success(response)),
            failed => failed,
        };

        if outcome.is_auth_failure()
            && middleware::claim_reauth(self.reauth_scope, &self.auth_manager, &mut ctx)
        {
            tracing::warn!(
                request_id = %ctx.request_id(),
                status = ?status_of(&outcome),
                "Received auth failure, re-authenticating and retrying once..."
            );

            middleware::refresh_auth(self.reauth_scope, &self.auth_manager, &mut ctx).await?;

            let url = ctx.url(&self.base_url)?;
            let retried = middleware::classify(
                middleware::dispatch(&self.client, url, &ctx).await,
            )
            .await;

            return match retried {
                Outcome::Success(response) => Ok(self.on_success(response)),
                failed => Err(self.fail(&ctx, failed)),
            };
        }

        Err(self.fail(&ctx, outcome))
    }

    /// Dispatch with generic retries; returns the last outcome
    async fn send_with_retry(&self, ctx: &RequestContext) -> Result<Outcome, ApiError> {
        let max_retries = self.retry_policy.max_retries;
        let mut attempt = 0;

        loop {
            let url = ctx.url(&self.base_url)?;

            tracing::debug!(
                request_id = %ctx.request_id(),
                attempt = attempt + 1,
                max_retries = max_retries,
                "Executing request attempt"
            );

            let outcome =
                middleware::classify(middleware::dispatch(&self.client, url, ctx).await).await;

            match &outcome {
                Outcome::Success(response) => {
                    tracing::debug!(status = %response.status(), "Request successful");
                }
                Outcome::Status { status, .. } => {
                    tracing::warn!(status = %status, "Received error response");
                }
                Outcome::Network { kind, message } => {
                    tracing::warn!(
                        error_kind = *kind,
                        error = %message,
                        attempt = attempt + 1,
                        "HTTP request error"
                    );
                }
            }

            if !self.retry_policy.should_retry(&outcome, ctx.method(), attempt) {
                return Ok(outcome);
            }

            let delay = self.retry_policy.backoff_delay(attempt);
            tracing::warn!(
                "Transient failure, retrying after {}ms (attempt {}/{})",
                delay.as_millis(),
                attempt + 1,
                max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn on_success(&self, response: Response) -> Response {
        self.auth_manager.reset_auth_retry();
        response
    }

    fn fail(&self, ctx: &RequestContext, outcome: Outcome) -> ApiError {
        let err = match outcome.into_result() {
            Ok(_) => ApiError::Internal(anyhow::anyhow!("Successful outcome treated as failure")),
            Err(err) => err,
        };

        tracing::error!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            error = %err,
            retryable = err.is_retryable(),
            "HTTP request failed"
        );
        err
    }

    /// Execute and decode a JSON response body
    pub async fn send_json<T: DeserializeOwned>(&self, ctx: RequestContext) -> Result<T, ApiError> {
        let response = self.execute(ctx).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::DecodeError(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ApiError::DecodeError(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(RequestContext::get(path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(RequestContext::post(path).with_body(body)?)
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(RequestContext::put(path).with_body(body)?).await
    }

    pub fn auth_manager(&self) -> &Arc<AuthManager> {
        &self.auth_manager
    }
}

fn status_of(outcome: &Outcome) -> Option<u16> {
    match outcome {
        Outcome::Status { status, .. } => Some(status.as_u16()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AUTH_PATH: &str = "/authorization/app1/s1";

    fn test_config(server: &MockServer) -> Config {
        Config::new("app1", "s1", "qa")
            .unwrap()
            .with_base_url(server.uri())
            .with_timeout_ms(500)
            .with_max_retries(3)
            .with_retry_base_delay_ms(1)
    }

    fn auth_body(token: &str) -> Value {
        json!({
            "token": token,
            "expiration": (Utc::now() + Duration::hours(1)).to_rfc3339(),
            "api": { "version": "2.0" }
        })
    }

    async fn mount_auth(server: &MockServer, token: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path(AUTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(token)))
            .up_to_n_times(times)
            .expect(times)
            .mount(server)
            .await;
    }

    fn client_for(config: &Config) -> DigiHttpClient {
        let auth = Arc::new(AuthManager::new(config).unwrap());
        DigiHttpClient::new(config, auth).unwrap()
    }

    #[tokio::test]
    async fn test_injects_token_query_parameter() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        Mock::given(method("GET"))
            .and(path("/2.0/legajo/id1"))
            .and(query_param("authorization", "T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let body: Value = client.get("/2.0/legajo/id1").await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_401_reauthenticates_once_and_retries() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        mount_auth(&server, "T2", 1).await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .and(query_param("authorization", "T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .and(query_param("authorization", "T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_id": "x" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let body: Value = client.get("/1.0/legajo/x").await.unwrap();
        assert_eq!(body["_id"], "x");
    }

    #[tokio::test]
    async fn test_second_401_propagates_without_more_retries() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        mount_auth(&server, "T2", 1).await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let err = client.get::<Value>("/1.0/legajo/x").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("invalid token"));
    }

    #[tokio::test]
    async fn test_503_retried_up_to_max_then_fails() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(4) // first attempt + 3 retries
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let err = client.get::<Value>("/1.0/legajo/x").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_503_recovers_when_server_comes_back() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_id": "x" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let body: Value = client.get("/1.0/legajo/x").await.unwrap();
        assert_eq!(body["_id"], "x");
    }

    #[tokio::test]
    async fn test_404_is_never_retried() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let err = client.get::<Value>("/1.0/legajo/missing").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_500_exhausts_retries_then_reauthenticates() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        mount_auth(&server, "T2", 1).await;
        Mock::given(method("PUT"))
            .and(path("/1.0/legajo/x"))
            .and(query_param("authorization", "T1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/1.0/legajo/x"))
            .and(query_param("authorization", "T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_id": "x" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let body: Value = client
            .put("/1.0/legajo/x", &json!({ "name": "Ana" }))
            .await
            .unwrap();
        assert_eq!(body["_id"], "x");
    }

    #[tokio::test]
    async fn test_post_network_error_is_not_retried() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config::new("app1", "s1", "qa")
            .unwrap()
            .with_base_url(format!("http://{}", addr))
            .with_retry_base_delay_ms(1);
        let auth = Arc::new(AuthManager::new(&config).unwrap());
        auth.seed_session("T1", Utc::now() + Duration::hours(1), None)
            .await;
        let client = DigiHttpClient::new(&config, auth).unwrap();

        let err = client
            .post::<_, Value>("/1.0/legajo", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Transport {
                kind: "connection_failed",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_get_network_error_retried_up_to_max() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config::new("app1", "s1", "qa")
            .unwrap()
            .with_base_url(format!("http://{}", addr))
            .with_max_retries(2)
            .with_retry_base_delay_ms(1);
        let auth = Arc::new(AuthManager::new(&config).unwrap());
        auth.seed_session("T1", Utc::now() + Duration::hours(1), None)
            .await;
        let client = DigiHttpClient::new(&config, auth).unwrap();

        let err = client.get::<Value>("/1.0/legajo/x").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Transport {
                kind: "connection_failed",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_get_timeout_retried_and_token_kept_out_of_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .expect(3) // first attempt + 2 retries
            .mount(&server)
            .await;

        let config = test_config(&server)
            .with_timeout_ms(200)
            .with_max_retries(2);
        let client = client_for(&config);
        client
            .auth_manager()
            .seed_session("FULLTOKENVALUE123456", Utc::now() + Duration::hours(1), None)
            .await;

        let err = client.get::<Value>("/slow").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { kind: "timeout", .. }));
        assert!(!err.to_string().contains("FULLTOKENVALUE123456"));
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/elsewhere", server.uri()).as_str()),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/elsewhere"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        client
            .auth_manager()
            .seed_session("T1", Utc::now() + Duration::hours(1), None)
            .await;

        let err = client.get::<Value>("/1.0/legajo/x").await.unwrap_err();
        assert_eq!(err.status(), Some(302));
    }

    #[tokio::test]
    async fn test_shared_scope_blocks_second_recovery_until_success() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        mount_auth(&server, "T2", 1).await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = test_config(&server).with_reauth_scope(ReauthScope::Shared);
        let client = client_for(&config);

        // First request spends the shared recovery
        assert!(client.get::<Value>("/1.0/legajo/x").await.is_err());
        assert!(client.auth_manager().has_retried());

        // Second request finds the flag set and fails without a fetch
        let err = client.get::<Value>("/1.0/legajo/x").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_success_resets_shared_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let config = test_config(&server).with_reauth_scope(ReauthScope::Shared);
        let client = client_for(&config);
        // Seeded so no fetch clears the flag on its own
        client
            .auth_manager()
            .seed_session("T1", Utc::now() + Duration::hours(1), None)
            .await;
        client.auth_manager().mark_retry();

        let _: Value = client.get("/1.0/legajo/x").await.unwrap();
        assert!(!client.auth_manager().has_retried());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        mount_auth(&server, "T1", 1).await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let err = client.get::<Value>("/1.0/legajo/x").await.unwrap_err();
        assert!(matches!(err, ApiError::DecodeError(_)));
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces_before_dispatch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(AUTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "expiration": "2030-01-01T00:00:00Z" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.0/legajo/x"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&test_config(&server));
        let err = client.get::<Value>("/1.0/legajo/x").await.unwrap_err();
        assert!(err.is_auth_error());
    }
}

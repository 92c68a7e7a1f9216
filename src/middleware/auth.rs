use crate::auth::{token_prefix, AuthManager};
use crate::config::ReauthScope;
use crate::error::ApiError;

use super::context::RequestContext;

/// Inject-auth stage: attach a valid token unless the request targets the
/// authorization endpoint itself
pub async fn inject_auth(auth: &AuthManager, ctx: &mut RequestContext) -> Result<(), ApiError> {
    if ctx.targets_authorization_endpoint() {
        tracing::debug!(path = %ctx.path(), "Authorization endpoint, skipping token injection");
        return Ok(());
    }

    let token = auth.get_token().await?;
    ctx.set_token(token);
    Ok(())
}

/// Claim the single re-authentication allowed for a failure cycle
///
/// Returns false when the cycle already spent it.
pub fn claim_reauth(scope: ReauthScope, auth: &AuthManager, ctx: &mut RequestContext) -> bool {
    if ctx.targets_authorization_endpoint() {
        return false;
    }

    match scope {
        ReauthScope::PerRequest => {
            if ctx.reauth_attempted() {
                return false;
            }
            ctx.mark_reauth_attempted();
            true
        }
        ReauthScope::Shared => {
            if auth.has_retried() {
                return false;
            }
            auth.mark_retry();
            ctx.mark_reauth_attempted();
            true
        }
    }
}

/// Replace the rejected token and re-attach the new one
pub async fn refresh_auth(
    scope: ReauthScope,
    auth: &AuthManager,
    ctx: &mut RequestContext,
) -> Result<(), ApiError> {
    let token = auth.reauthenticate(ctx.token()).await?;

    // A completed fetch clears the shared flag; the cycle is still in progress
    if scope == ReauthScope::Shared {
        auth.mark_retry();
    }

    tracing::debug!(
        request_id = %ctx.request_id(),
        token = %token_prefix(&token),
        "Retrying with new token"
    );
    ctx.set_token(token);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::middleware::TOKEN_PARAM;
    use chrono::{Duration, Utc};

    async fn seeded_manager() -> AuthManager {
        // Unroutable base URL: a fetch would fail, so these tests prove no fetch happens
        let config = Config::new("app1", "s1", "qa")
            .unwrap()
            .with_base_url("http://127.0.0.1:1")
            .with_timeout_ms(200);
        let manager = AuthManager::new(&config).unwrap();
        manager
            .seed_session("T1", Utc::now() + Duration::hours(1), Some("2.0"))
            .await;
        manager
    }

    #[tokio::test]
    async fn test_inject_auth_sets_query_parameter() {
        let manager = seeded_manager().await;
        let mut ctx = RequestContext::get("/2.0/legajo/id1?authorization=caller-value");
        inject_auth(&manager, &mut ctx).await.unwrap();
        assert_eq!(ctx.query_value(TOKEN_PARAM), Some("T1"));
        assert_eq!(ctx.token(), Some("T1"));
    }

    #[tokio::test]
    async fn test_inject_auth_skips_authorization_endpoint() {
        let manager = seeded_manager().await;
        let mut ctx = RequestContext::get("/authorization/app1/s1");
        inject_auth(&manager, &mut ctx).await.unwrap();
        assert!(ctx.query_value(TOKEN_PARAM).is_none());
        assert!(ctx.token().is_none());
    }

    #[tokio::test]
    async fn test_inject_auth_surfaces_fetch_failure() {
        let config = Config::new("app1", "s1", "qa")
            .unwrap()
            .with_base_url("http://127.0.0.1:1")
            .with_timeout_ms(200);
        let manager = AuthManager::new(&config).unwrap();
        let mut ctx = RequestContext::get("/1.0/legajo/id1");
        let err = inject_auth(&manager, &mut ctx).await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_claim_reauth_per_request_is_one_shot() {
        let manager = seeded_manager().await;
        let mut first = RequestContext::get("/1.0/legajo/a");
        let mut second = RequestContext::get("/1.0/legajo/b");

        assert!(claim_reauth(ReauthScope::PerRequest, &manager, &mut first));
        assert!(!claim_reauth(ReauthScope::PerRequest, &manager, &mut first));
        // Another request has its own budget
        assert!(claim_reauth(ReauthScope::PerRequest, &manager, &mut second));
        assert!(!manager.has_retried());
    }

    #[tokio::test]
    async fn test_claim_reauth_shared_uses_manager_flag() {
        let manager = seeded_manager().await;
        let mut first = RequestContext::get("/1.0/legajo/a");
        let mut second = RequestContext::get("/1.0/legajo/b");

        assert!(claim_reauth(ReauthScope::Shared, &manager, &mut first));
        assert!(manager.has_retried());
        assert!(!claim_reauth(ReauthScope::Shared, &manager, &mut second));

        manager.reset_auth_retry();
        assert!(claim_reauth(ReauthScope::Shared, &manager, &mut second));
    }

    #[tokio::test]
    async fn test_claim_reauth_never_for_authorization_endpoint() {
        let manager = seeded_manager().await;
        let mut ctx = RequestContext::get("/authorization/app1/s1");
        assert!(!claim_reauth(ReauthScope::PerRequest, &manager, &mut ctx));
    }
}

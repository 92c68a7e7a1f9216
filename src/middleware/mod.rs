// Request pipeline stages
//
// Ordered as the transport runs them:
//   inject_auth -> dispatch -> classify -> RetryPolicy (generic retries)
//   -> claim_reauth / refresh_auth (one-shot recovery on 401/500)

pub mod auth;
pub mod classify;
pub mod context;
pub mod retry;

pub use auth::{claim_reauth, inject_auth, refresh_auth};
pub use classify::{classify, dispatch, error_kind, Outcome};
pub use context::{RequestContext, TOKEN_PARAM};
pub use retry::{is_idempotent, RetryPolicy};

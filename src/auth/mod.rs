// Authentication module
// Manages the token lifecycle against the authorization endpoint

mod manager;
mod refresh;
mod types;

pub use manager::AuthManager;
pub(crate) use manager::token_prefix;
pub use refresh::{authorization_url, is_authorization_path, parse_auth_response};
pub use types::{ApiInfo, AuthResponse, Session, TokenData};

// Digiventures SDK - credentialed client for the Digiventures REST API

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod middleware;
pub mod models;
pub mod sdk;
pub mod services;

pub use config::{Config, Environment, ReauthScope};
pub use error::{ApiError, Result};
pub use sdk::DigiSdk;

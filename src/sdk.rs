// SDK entry point: wires the auth manager, transport and services together

use std::sync::Arc;

use crate::auth::AuthManager;
use crate::config::Config;
use crate::error::ApiError;
use crate::http_client::DigiHttpClient;
use crate::models::FileResponse;
use crate::services::LegajoService;

pub struct DigiSdk {
    auth_manager: Arc<AuthManager>,
    client: Arc<DigiHttpClient>,
    legajo: LegajoService,
}

impl DigiSdk {
    /// Build the SDK; configuration problems surface here, before any request
    pub fn new(config: Config) -> Result<Self, ApiError> {
        tracing::debug!(
            environment = %config.environment,
            base_url = %config.base_url(),
            "Initializing Digiventures SDK"
        );

        let auth_manager = Arc::new(AuthManager::new(&config)?);
        let client = Arc::new(DigiHttpClient::new(&config, auth_manager.clone())?);
        let legajo = LegajoService::new(client.clone());

        Ok(Self {
            auth_manager,
            client,
            legajo,
        })
    }

    pub fn legajo(&self) -> &LegajoService {
        &self.legajo
    }

    pub fn auth_manager(&self) -> &Arc<AuthManager> {
        &self.auth_manager
    }

    /// Get a file by absolute URL or path
    ///
    /// Absolute URLs keep only their path and query; the request always goes
    /// to the configured base URL.
    pub async fn get_file(&self, file_url: &str) -> Result<FileResponse, ApiError> {
        let path = file_request_path(file_url)?;
        tracing::debug!(path = %path, "Fetching file");
        self.client.get(&path).await
    }
}

/// Path (and query) a file URL is requested under
pub fn file_request_path(file_url: &str) -> Result<String, ApiError> {
    if file_url.starts_with("http://") || file_url.starts_with("https://") {
        let url = url::Url::parse(file_url)
            .map_err(|e| ApiError::ConfigError(format!("Invalid file URL {}: {}", file_url, e)))?;
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        return Ok(path);
    }

    if file_url.starts_with('/') {
        Ok(file_url.to_string())
    } else {
        Ok(format!("/{}", file_url))
    }
}

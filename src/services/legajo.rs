use std::sync::Arc;

use crate::error::ApiError;
use crate::http_client::DigiHttpClient;
use crate::middleware::RequestContext;
use crate::models::{Legajo, LegajoCreateData, LegajoUpdateData, Reference, Strategy};

/// Version used in resource paths until the authorization endpoint reports one
pub const DEFAULT_API_VERSION: &str = "1.0";

/// Create, read and update legajos
#[derive(Clone)]
pub struct LegajoService {
    client: Arc<DigiHttpClient>,
}

impl LegajoService {
    pub fn new(client: Arc<DigiHttpClient>) -> Self {
        Self { client }
    }

    /// API version path prefix, e.g. "/1.0"
    async fn api_version_path(&self) -> String {
        let version = self.client.auth_manager().get_api_version().await;
        format!("/{}", version.as_deref().unwrap_or(DEFAULT_API_VERSION))
    }

    /// Make sure the API version is known before building a path
    ///
    /// The version arrives with the token, so the first call of a fresh client
    /// fetches it here instead of falling back to the default.
    async fn resource_path(&self, suffix: &str) -> Result<String, ApiError> {
        self.client.auth_manager().get_token().await?;
        Ok(format!("{}{}", self.api_version_path().await, suffix))
    }

    /// Path of a single legajo; the ID is escaped as one path segment
    async fn legajo_path(&self, legajo_id: &str) -> Result<String, ApiError> {
        self.resource_path(&format!("/legajo/{}", urlencoding::encode(legajo_id)))
            .await
    }

    /// Create a legajo, optionally with a creation strategy
    pub async fn create(
        &self,
        data: &LegajoCreateData,
        strategy: Option<Strategy>,
    ) -> Result<Legajo, ApiError> {
        let path = self.resource_path("/legajo").await?;
        let mut ctx = RequestContext::post(&path).with_body(data)?;
        if let Some(strategy) = strategy {
            ctx = ctx.with_header(Strategy::HEADER, strategy.as_str())?;
        }

        tracing::info!(strategy = ?strategy, "Creating legajo");
        self.client.send_json(ctx).await
    }

    /// Get a legajo by ID
    pub async fn get(&self, legajo_id: &str) -> Result<Legajo, ApiError> {
        let path = self.legajo_path(legajo_id).await?;
        self.client.get(&path).await
    }

    /// Update a legajo
    pub async fn update(
        &self,
        legajo_id: &str,
        data: &LegajoUpdateData,
    ) -> Result<Legajo, ApiError> {
        let path = self.legajo_path(legajo_id).await?;
        self.client.put(&path, data).await
    }

    async fn resolve(&self, reference: Reference) -> Result<Legajo, ApiError> {
        match reference {
            Reference::ById(id) => self.get(&id).await,
            Reference::Resolved(legajo) => Ok(*legajo),
        }
    }

    /// Recovery link of a legajo, if it has one
    pub async fn get_link_recover(
        &self,
        reference: impl Into<Reference>,
    ) -> Result<Option<String>, ApiError> {
        let legajo = self.resolve(reference.into()).await?;
        Ok(legajo.link_recover.filter(|link| !link.is_empty()))
    }

    /// Applicant link of a legajo, if it has one
    pub async fn get_link_applicant(
        &self,
        reference: impl Into<Reference>,
    ) -> Result<Option<String>, ApiError> {
        let legajo = self.resolve(reference.into()).await?;
        Ok(legajo.link_applicant.filter(|link| !link.is_empty()))
    }
}

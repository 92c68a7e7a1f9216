use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

// ==================================================================================================
// Legajo
// ==================================================================================================

/// A legajo (applicant record) as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legajo {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub id_number: String,
    #[serde(default)]
    pub reference_code: String,
    #[serde(default)]
    pub link_landing_next: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_recover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_applicant: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,

    /// Fields the API returns beyond the ones modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegajoCreateData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Partial update; any field besides `vouchers` goes in `fields`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegajoUpdateData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vouchers: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

// ==================================================================================================
// Create strategy
// ==================================================================================================

/// Create-time directive passed through in the `strategy` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Ignore,
    Complete,
    Override,
}

impl Strategy {
    pub const HEADER: &'static str = "strategy";

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Ignore => "IGNORE",
            Strategy::Complete => "COMPLETE",
            Strategy::Override => "OVERRIDE",
        }
    }
}

impl FromStr for Strategy {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IGNORE" => Ok(Strategy::Ignore),
            "COMPLETE" => Ok(Strategy::Complete),
            "OVERRIDE" => Ok(Strategy::Override),
            _ => Err(ApiError::ConfigError(format!("Invalid strategy: {}", s))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================================================================================================
// References and files
// ==================================================================================================

/// A legajo given either by ID or as an already fetched record
#[derive(Debug, Clone)]
pub enum Reference {
    ById(String),
    Resolved(Box<Legajo>),
}

impl From<&str> for Reference {
    fn from(id: &str) -> Self {
        Reference::ById(id.to_string())
    }
}

impl From<String> for Reference {
    fn from(id: String) -> Self {
        Reference::ById(id)
    }
}

impl From<Legajo> for Reference {
    fn from(legajo: Legajo) -> Self {
        Reference::Resolved(Box::new(legajo))
    }
}

/// File download response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResponse {
    /// Base64 encoded content
    pub file: String,
}

impl FileResponse {
    /// Decode the base64 content into raw bytes
    pub fn decode(&self) -> Result<Vec<u8>, ApiError> {
        use base64::Engine;

        base64::engine::general_purpose::STANDARD
            .decode(self.file.trim())
            .map_err(|e| ApiError::DecodeError(format!("Invalid base64 file content: {}", e)))
    }
}

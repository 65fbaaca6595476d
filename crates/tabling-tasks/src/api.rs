//! REST collaborator boundary
//!
//! [`TableApi`] is the only seam to the server. Failures come back as
//! [`ApiError`], which [`ApiError::classify`] splits into errors attached to
//! a cell and errors shown to the user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tabling_rows::{GroupId, GroupModel, MarkupId, Model, ModelId, Payload, TableResponse};

/// List request parameters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// Search text, empty for none
    pub search: String,
    /// Rows per page
    pub page_size: usize,
}

/// Server endpoints backing one table
#[async_trait]
pub trait TableApi: Send + Sync + 'static {
    /// Fetch the table
    async fn list(&self, query: &ListQuery) -> Result<TableResponse, ApiError>;

    /// Create a line item
    async fn create(&self, payload: &Payload) -> Result<Model, ApiError>;

    /// Patch a line item
    async fn update(&self, id: ModelId, payload: &Payload) -> Result<Model, ApiError>;

    /// Delete a line item
    async fn delete(&self, id: ModelId) -> Result<(), ApiError>;

    /// Replace a group's children
    async fn update_group(&self, id: GroupId, children: &[ModelId]) -> Result<GroupModel, ApiError>;

    /// Delete a group (children stay)
    async fn delete_group(&self, id: GroupId) -> Result<(), ApiError>;

    /// Delete a markup
    async fn delete_markup(&self, id: MarkupId) -> Result<(), ApiError>;
}

/// One entry of a server error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Field the error refers to; absent for global errors
    #[serde(default)]
    pub field: Option<String>,
    /// Machine-readable code
    #[serde(default = "unknown_code")]
    pub code: String,
    /// Human-readable message
    pub message: String,
}

fn unknown_code() -> String {
    "unknown".to_string()
}

/// Server error body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerErrorBody {
    /// Reported errors
    #[serde(default)]
    pub errors: Vec<ServerError>,
}

/// API failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Server answered with an error status
    #[error("server responded with status {status}")]
    Server {
        /// HTTP status
        status: u16,
        /// Parsed error body
        body: ServerErrorBody,
    },

    /// Request never completed
    #[error("network error: {0}")]
    Network(String),

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Error attached to a field of the row being saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name
    pub field: String,
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Error shown to the user as a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalError {
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// An [`ApiError`] split by where it is displayed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifiedErrors {
    /// Inline errors
    pub fields: Vec<FieldError>,
    /// Notifications
    pub global: Vec<GlobalError>,
}

impl ApiError {
    /// Build from an error status and raw body
    ///
    /// A body that is not a recognizable error document becomes a single
    /// global error carrying the raw text.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let body = serde_json::from_str::<ServerErrorBody>(body)
            .ok()
            .filter(|b| !b.errors.is_empty())
            .unwrap_or_else(|| ServerErrorBody {
                errors: vec![ServerError {
                    field: None,
                    code: format!("http_{status}"),
                    message: if body.is_empty() {
                        format!("Request failed with status {status}")
                    } else {
                        body.to_string()
                    },
                }],
            });
        Self::Server { status, body }
    }

    /// Split into field and global errors
    #[must_use]
    pub fn classify(&self) -> ClassifiedErrors {
        let mut classified = ClassifiedErrors::default();
        match self {
            Self::Server { body, .. } => {
                for error in &body.errors {
                    match &error.field {
                        Some(field) => classified.fields.push(FieldError {
                            field: field.clone(),
                            code: error.code.clone(),
                            message: error.message.clone(),
                        }),
                        None => classified.global.push(GlobalError {
                            code: error.code.clone(),
                            message: error.message.clone(),
                        }),
                    }
                }
            }
            Self::Network(message) => classified.global.push(GlobalError {
                code: "network".to_string(),
                message: message.clone(),
            }),
            Self::Malformed(message) => classified.global.push(GlobalError {
                code: "malformed".to_string(),
                message: message.clone(),
            }),
        }
        classified
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

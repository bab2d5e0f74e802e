use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::{ApiResponse, metadata::MetadataError};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by the HTTP layer and startup code
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Metadata(err) => match err {
                MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                MetadataError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                MetadataError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
                MetadataError::Transport(_)
                | MetadataError::Decode(_)
                | MetadataError::UpstreamStatus { .. } => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = ApiResponse::<()> {
            code: status.as_u16(),
            message: self.to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

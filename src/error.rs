//! Errors surfaced to HTTP callers.

use crate::{
    auth::{AuthError, PeriodError},
    store::{StepError, StoreError},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("try again later")]
    Throttled,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Logged with its full chain; callers only see a generic message.
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Throttled => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Infrastructure(err) => {
                error!("Request failed: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => Self::Unauthorized,
            AuthError::InvalidPeriod => Self::Validation(err.to_string()),
            AuthError::Infrastructure(source) => Self::Infrastructure(source),
        }
    }
}

impl From<PeriodError> for ApiError {
    fn from(err: PeriodError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // A failed rollback outranks the step's own signal.
        match &err {
            StoreError::Step {
                source: StepError::NotFound(what),
                ..
            } => Self::NotFound(format!("{what} not found")),
            StoreError::Step {
                source: StepError::Conflict(_),
                ..
            } => Self::Conflict("resource already exists".to_string()),
            _ => Self::Infrastructure(err.into()),
        }
    }
}

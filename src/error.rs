use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A field value the service refuses to store.
    #[error("{0}")]
    Validation(String),

    /// Uniqueness violation (email).
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn user_not_found() -> Self {
        ApiError::NotFound("User not found".into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        // The table's UNIQUE(email) only fires when a concurrent writer slipped
        // past the explicit pre-check.
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return ApiError::Conflict("Email already registered".into());
            }
        }
        ApiError::Internal(e.to_string())
    }
}

// Rejections from axum's extractors all surface as 422 with a `detail` body.
impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::Internal(msg) => {
                error!(error = %msg, "request failed");
                "Internal server error".to_string()
            }
            ApiError::Validation(msg) | ApiError::Conflict(msg) | ApiError::NotFound(msg) => msg,
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

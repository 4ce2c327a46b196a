use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Failure taxonomy for the platform.
///
/// `Storage` aborts the operation that raised it: the durable store is
/// authoritative and no cache-only write is ever allowed to stand. `Cache` is
/// always recoverable by falling back to the durable store and `Broadcast`
/// never fails the request that triggered the publish; both of those surface
/// here only when a handler has nothing left to fall back to.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Rank cache error: {0}")]
    Cache(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Storage { .. } | AppError::Cache { .. } | AppError::Broadcast { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

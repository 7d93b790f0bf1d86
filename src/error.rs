use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream returned incomplete data: {0}")]
    IncompleteData(String),

    #[error("Upstream not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Vote rejected: {0}")]
    VoteRejected(String),

    #[error("Seed file error: {0}")]
    Seed(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::VoteRejected(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) | AppError::IncompleteData(_) | AppError::NotConfigured(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Database(_) | AppError::Seed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

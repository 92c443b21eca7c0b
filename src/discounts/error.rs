use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error types for discount operations
#[derive(Debug, thiserror::Error)]
pub enum DiscountError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Discount not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A discount sweep is already running")]
    SweepInProgress,
}

impl IntoResponse for DiscountError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            DiscountError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            DiscountError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            DiscountError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            DiscountError::SweepInProgress => (StatusCode::CONFLICT, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

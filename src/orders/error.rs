use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// Error types for order operations
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Order not found")]
    NotFound,

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Product not available for sale: {0}")]
    ProductNotSellable(Uuid),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl OrderError {
    /// True for transient storage conflicts the lifecycle controller retries
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::Database(err) => crate::db::is_retryable(err),
            _ => false,
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            OrderError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            OrderError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            OrderError::ProductNotFound(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            OrderError::ProductNotSellable(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            OrderError::InsufficientStock { .. } => (StatusCode::CONFLICT, self.to_string()),
            OrderError::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            OrderError::InvalidTransition(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            OrderError::ValidationError(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

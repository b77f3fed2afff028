use crate::database::StoreError;
use crate::schema::ValidationErrors;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::debug;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid movie: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("Movie not found")]
    NotFound(String),
    #[error("Missing genre query parameter")]
    MissingGenre,
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(id),
            StoreError::MissingGenre => ApiError::MissingGenre,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MissingGenre | ApiError::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::NotFound(id) => debug!("movie {} not found", id),
            other => debug!("{}", other),
        }
        let body = match self {
            ApiError::Validation(errors) => json!({ "error": errors }),
            other => json!({ "message": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

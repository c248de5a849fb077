// error module: the API error taxonomy and its JSON rendering.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::DomainError;
use crate::store::StoreError;
use crate::validation::FieldResult;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<FieldResult>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ImmutableInvoice(String),
    #[error("{0}")]
    Persistence(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::ImmutableInvoice(_) => "immutable_invoice",
            AppError::Persistence(_) => "persistence_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ImmutableInvoice(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Logs the store failure with its context and hides the driver text from callers.
pub fn persistence(op: &'static str, err: StoreError) -> AppError {
    error!(op, error = %err, "persistence failure");
    let message = match err {
        StoreError::Timeout => "the database did not respond in time",
        _ => "a storage error occurred, please try again",
    };
    AppError::Persistence(message.to_string())
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::validation(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let tag = self.tag();
        let body = match self {
            AppError::Validation { message, fields } if !fields.is_empty() => {
                json!({ "error": tag, "message": message, "fields": fields })
            }
            other => json!({ "error": tag, "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_tag_mapping() {
        let cases = [
            (AppError::validation("x"), StatusCode::BAD_REQUEST, "validation_error"),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "unauthorized"),
            (AppError::Conflict("x".into()), StatusCode::BAD_REQUEST, "conflict"),
            (AppError::ImmutableInvoice("x".into()), StatusCode::CONFLICT, "immutable_invoice"),
            (
                AppError::Persistence("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence_error",
            ),
        ];
        for (err, status, tag) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.tag(), tag);
        }
    }

    #[test]
    fn persistence_hides_backend_text() {
        let err = persistence("test", StoreError::Backend("socket reset by 10.0.0.3".into()));
        assert!(!err.to_string().contains("10.0.0.3"));
    }
}

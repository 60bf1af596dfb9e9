use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::error::AuthError;

/// Every failure a handler can answer with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Store already exists")]
    DuplicateStore,

    #[error("Tag already exists")]
    DuplicateTag,

    #[error("{0}")]
    Validation(String),

    #[error("Incorrect user credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Tag does not belong to the store")]
    CrossStoreLink,

    #[error("Tag already linked to the item")]
    AlreadyLinked,

    #[error("Tag is linked to an item")]
    TagLinked,

    #[error("Store still has items or tags")]
    StoreNotEmpty,

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateUsername
            | AppError::DuplicateStore
            | AppError::DuplicateTag
            | AppError::CrossStoreLink
            | AppError::AlreadyLinked
            | AppError::TagLinked
            | AppError::StoreNotEmpty => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidCredentials | AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::DuplicateUsername => "duplicate_username",
            AppError::DuplicateStore => "duplicate_store",
            AppError::DuplicateTag => "duplicate_tag",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Auth(e) => e.code(),
            AppError::CrossStoreLink => "cross_store_link",
            AppError::AlreadyLinked => "already_linked",
            AppError::TagLinked => "tag_linked",
            AppError::StoreNotEmpty => "store_not_empty",
            AppError::Storage(_) | AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Storage(e) => {
                error!(error = %e, "storage failure");
                "An internal error occurred".to_string()
            }
            AppError::Internal(e) => {
                error!(error = %e, "internal failure");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(json!({
                "error": self.code(),
                "message": message,
            })),
        )
            .into_response()
    }
}

//! HTTP-facing error taxonomy.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::password::CredentialError;
use crate::users::repo::StoreError;
use crate::users::validation::ValidationError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Body or query string the extractors could not decode.
    #[error("{0}")]
    MalformedRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("internal server error")]
    Internal(anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl ApiError {
    pub fn user_not_found() -> Self {
        ApiError::NotFound("User not found".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedRequest(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) | ApiError::MalformedRequest(_) => "UnprocessableEntity",
            ApiError::Conflict(_) => "Conflict",
            ApiError::NotFound(_) => "ResourceNotFound",
            ApiError::Unauthorized(_) => "NotAuthorized",
            ApiError::Internal(_) => "InternalError",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // the unique index fired after the pre-check passed
            StoreError::Conflict { field } => ApiError::Validation(ValidationError::new(
                field,
                format!("The {field} is already taken"),
            )),
            StoreError::Database(e) => ApiError::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::MalformedRequest(rejection.body_text())
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(source) = &self {
            error!(error = ?source, "request failed with internal error");
        }

        let message = match &self {
            ApiError::Validation(v) => v.message.clone(),
            other => other.to_string(),
        };
        let field = match &self {
            ApiError::Validation(v) => Some(v.field),
            _ => None,
        };
        let body = ErrorBody {
            code: self.code(),
            message: &message,
            field,
        };
        (status, Json(body)).into_response()
    }
}

//! Response envelope shared by every route.
//!
//! Handlers return `Result<Success<T>, ApiError>`. Success serializes as
//! `{"success": true, ...T}`; failure as `{"success": false, "error": ...,
//! "details"?: {...}}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::media::MediaError;
use crate::store::StoreError;

/// Per-field validation messages, keyed by request field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<FieldErrors>,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// Duplicate unique key. Reported as 400 like other input problems.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("{context}: {source}")]
    Upload {
        context: &'static str,
        #[source]
        source: MediaError,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: FieldErrors) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    /// Wraps a store failure; `context` is the client-facing message
    /// ("Failed to fetch skills"), the store error itself is only logged.
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Store { context, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store { .. } | ApiError::Upload { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message. Internal failures expose only their context.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Store { context, .. } | ApiError::Upload { context, .. } => {
                context.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        ApiError::validation("Invalid request body")
    }
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Store { context, source } => {
                tracing::error!(error = %source, "{}", context);
            }
            ApiError::Upload { context, source } => {
                tracing::error!(error = %source, "{}", context);
            }
            _ => {}
        }

        let details = match &self {
            ApiError::Validation { details, .. } => details.clone(),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.client_message(),
                details,
            }),
        )
            .into_response()
    }
}

/// Successful response; `payload` fields are flattened next to `success: true`.
#[derive(Debug)]
pub struct Success<T> {
    status: StatusCode,
    payload: T,
}

#[derive(Serialize)]
struct SuccessBody<'a, T> {
    success: bool,
    #[serde(flatten)]
    payload: &'a T,
}

impl<T: Serialize> Success<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            status: StatusCode::OK,
            payload,
        }
    }

    pub fn created(payload: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            payload,
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            success: true,
            payload: &self.payload,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Payload for responses that carry nothing but an optional message.
#[derive(Debug, Default, Serialize)]
pub struct Done {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Done {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

pub type ApiResult<T> = Result<Success<T>, ApiError>;

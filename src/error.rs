use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    models::Action,
    repository::RepositoryError,
    response::{ApiResponse, ErrorDetail},
};

/// AppError
///
/// Every expected failure a handler or core operation can produce.
/// The variants map one-to-one to a status code and are rendered through the
/// standard envelope, so callers never build error responses by hand.
#[derive(Debug, Error)]
pub enum AppError {
    /// A referenced role, module or user does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation or a dependent record blocking the mutation.
    #[error("{0}")]
    Conflict(String),

    /// Attempt to change a protected (system) role.
    #[error("{0}")]
    ForbiddenMutation(String),

    /// The authorization resolver denied the action.
    #[error("Permission denied: {action} on {module_key}")]
    AuthorizationDenied { module_key: String, action: Action },

    /// Missing, malformed or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the account is inactive or barred from the system.
    #[error("{0}")]
    AccessDisabled(String),

    /// Generic 403 for caller-level rules (e.g. editing someone else's profile).
    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error")]
    Validation(Vec<ErrorDetail>),

    /// Anything unexpected. The detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ForbiddenMutation(_)
            | AppError::AuthorizationDenied { .. }
            | AppError::AccessDisabled(_)
            | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `Validation` when `errors` is non-empty.
    pub fn check(errors: Vec<ErrorDetail>) -> Result<(), AppError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueViolation(what) => {
                AppError::Conflict(format!("{what} already exists"))
            }
            RepositoryError::ForeignKeyViolation(reason) => AppError::Conflict(reason),
            RepositoryError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(vec![ErrorDetail::field("body", rejection.body_text())])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, errors) = match &self {
            AppError::Internal(detail) => {
                // Full detail stays in the logs; the client gets a generic message.
                tracing::error!(error = %detail, "unhandled internal error");
                (
                    "Internal server error".to_string(),
                    vec![ErrorDetail::message("An unexpected error occurred")],
                )
            }
            AppError::Validation(details) => ("Validation error".to_string(), details.clone()),
            AppError::AuthorizationDenied { module_key, action } => {
                tracing::debug!(module_key = %module_key, action = %action, "authorization denied");
                (self.to_string(), vec![ErrorDetail::message(self.to_string())])
            }
            other => (other.to_string(), vec![ErrorDetail::message(other.to_string())]),
        };

        let mut response = ApiResponse::error(status, message, errors).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// ValidatedJson
///
/// Drop-in replacement for `axum::Json` whose rejection is rendered as a 422
/// envelope instead of axum's plain-text body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

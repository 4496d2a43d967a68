use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

/// ErrorDetail
///
/// One entry of the envelope's `errors` list. `field` is set for validation
/// failures that can be pinned to an input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ErrorDetail {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// PaginationMeta
///
/// Metadata attached to list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if total > 0 && per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            total,
            page,
            per_page,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

/// PaginationParams
///
/// Query parameters accepted by paginated listings (`?page=1&perPage=10`).
/// Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number, starting at 1.
    pub page: Option<i64>,
    /// Items per page, 1 to 100 (default 10).
    pub per_page: Option<i64>,
}

impl PaginationParams {
    pub const DEFAULT_PER_PAGE: i64 = 10;
    pub const MAX_PER_PAGE: i64 = 100;
    /// Highest page whose offset still fits in an i64 at the largest page size.
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_PER_PAGE;

    pub fn page(&self) -> i64 {
        self.page
            .filter(|page| *page >= 1)
            .map_or(1, |page| page.min(Self::MAX_PAGE))
    }

    pub fn per_page(&self) -> i64 {
        match self.per_page {
            Some(n) if n < 1 => Self::DEFAULT_PER_PAGE,
            Some(n) if n > Self::MAX_PER_PAGE => Self::MAX_PER_PAGE,
            Some(n) => n,
            None => Self::DEFAULT_PER_PAGE,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

/// ApiResponse
///
/// The uniform envelope every endpoint answers with:
/// `{ message, status, result, errors, meta? }`.
/// `status` mirrors the HTTP status code of the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub status: u16,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PaginationMeta>,
}

impl<T> ApiResponse<T> {
    pub fn ok(result: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, result, message)
    }

    pub fn created(result: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CREATED, result, message)
    }

    fn with_status(status: StatusCode, result: T, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: status.as_u16(),
            result: Some(result),
            errors: Vec::new(),
            meta: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(items: Vec<T>, total: i64, page: i64, per_page: i64, message: impl Into<String>) -> Self {
        let mut response = Self::ok(items, message);
        response.meta = Some(PaginationMeta::new(total, page, per_page));
        response
    }

    /// Reports every item on a single page.
    pub fn unpaginated(items: Vec<T>, message: impl Into<String>) -> Self {
        let total = items.len() as i64;
        Self::list(items, total, 1, total, message)
    }
}

impl ApiResponse<()> {
    pub fn error(status: StatusCode, message: impl Into<String>, errors: Vec<ErrorDetail>) -> Self {
        Self {
            message: message.into(),
            status: status.as_u16(),
            result: None,
            errors,
            meta: None,
        }
    }

    pub fn deleted(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::OK.as_u16(),
            result: None,
            errors: Vec::new(),
            meta: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

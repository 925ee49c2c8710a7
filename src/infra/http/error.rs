use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::application::error::AppError;
use crate::cache::CacheError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const CACHE_UNAVAILABLE: &str = "cache_unavailable";
    pub const CACHE_CORRUPT: &str = "cache_corrupt";
    pub const SOURCE_ERROR: &str = "source_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "admin secret required",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::Domain(domain) => ApiError::bad_request(domain.to_string()),
            AppError::Cache(CacheError::Store(_)) => {
                error!(error = %err, "Shared store failure");
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    codes::CACHE_UNAVAILABLE,
                    "cache temporarily unavailable",
                )
            }
            AppError::Cache(_) => {
                error!(error = %err, "Cache data integrity failure");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::CACHE_CORRUPT,
                    "internal error",
                )
            }
            AppError::Source(_) => {
                error!(error = %err, "Source aggregation failure");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::SOURCE_ERROR,
                    "internal error",
                )
            }
            AppError::Infra(_) | AppError::Unexpected(_) => {
                error!(error = %err, "Unexpected failure");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::INTERNAL,
                    "internal error",
                )
            }
        }
    }
}

use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::auth::AuthError;
use crate::domain::order::OrderError;
use crate::utils::IsTransient;

/// Seconds a client should wait before retrying after a storage failure
const RETRY_AFTER_SECS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("{0}")]
    InvalidRequest(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidRequest(message.into())
    }

    /// Error kind reported in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Auth(AuthError::Forbidden(_)) => "Forbidden",
            ApiError::Auth(AuthError::MalformedPath(_)) => "InvalidRequest",
            ApiError::Auth(_) => "Unauthenticated",
            ApiError::Order(e) => e.kind(),
            ApiError::InvalidRequest(_) => "InvalidRequest",
        }
    }

    fn message(&self) -> String {
        match self {
            // Storage details stay in the logs.
            ApiError::Order(e @ OrderError::Storage(_)) if e.is_transient() => {
                "Storage temporarily unavailable".to_string()
            }
            ApiError::Order(OrderError::Storage(_)) => "Internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            "Unauthenticated" => StatusCode::UNAUTHORIZED,
            "Forbidden" => StatusCode::FORBIDDEN,
            "NotFound" => StatusCode::NOT_FOUND,
            "EmptyOrder" => StatusCode::UNPROCESSABLE_ENTITY,
            "IllegalTransition" => StatusCode::CONFLICT,
            "StorageUnavailable" => StatusCode::SERVICE_UNAVAILABLE,
            "StorageFailure" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut response = HttpResponse::build(status);

        match status {
            StatusCode::UNAUTHORIZED => {
                response.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                response.insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS.to_string()));
            }
            _ => {}
        }

        response.json(ErrorBody {
            error: self.kind(),
            message: self.message(),
        })
    }
}

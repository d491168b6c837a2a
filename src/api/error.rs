use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::logic::ServiceError;

const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication Failed", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "Access Denied", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Resource Not Found", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Validation Error", message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed", message)
    }

    fn body(&self) -> ErrorResponse {
        ErrorResponse {
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: self.status.as_u16(),
            error: self.error.to_string(),
            message: self.message.clone(),
            path: String::new(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => ApiError::not_found(message),
            ServiceError::Conflict(message) => ApiError::new(StatusCode::CONFLICT, "Conflict", message),
            ServiceError::PermissionDenied(message) => ApiError::forbidden(message),
            ServiceError::Validation(message) => ApiError::validation(message),
            ServiceError::OptimisticConflict(message) => {
                ApiError::new(StatusCode::CONFLICT, "Concurrent Modification", message)
            }
            ServiceError::Unexpected(err) => {
                log::error!("Unexpected error: {:#}", err);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    UNEXPECTED_MESSAGE,
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        let mut response = (self.status, Json(body.clone())).into_response();
        // Picked up by `attach_error_path`, which knows the request URI.
        response.extensions_mut().insert(body);
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body extractor whose rejections use the common error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path-parameter extractor whose rejections use the common error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query-string extractor whose rejections use the common error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Fills `path` in error bodies produced anywhere below this layer. The
/// router's bare 405 responses get the same body, keeping their `Allow` header.
pub async fn attach_error_path(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();
    let response = next.run(request).await;

    let body = match response.extensions().get::<ErrorResponse>() {
        Some(body) => body.clone(),
        None if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
            ApiError::method_not_allowed(format!("Request method '{}' is not supported", method))
                .body()
        }
        None => return response,
    };
    let status = response.status();
    let (mut parts, _) = response.into_parts();
    parts.extensions.remove::<ErrorResponse>();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);

    let body = ErrorResponse { path, ..body };
    let rebuilt = Json(body).into_response();
    let (rebuilt_parts, rebuilt_body) = rebuilt.into_parts();
    parts.status = status;
    parts.headers.extend(rebuilt_parts.headers);
    Response::from_parts(parts, rebuilt_body)
}

/// Router fallback for unknown routes.
pub async fn not_found_fallback() -> ApiError {
    ApiError::not_found("No handler found for this route")
}

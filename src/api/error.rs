//! HTTP mapping of [`UrlshrtError`]

use actix_web::http::StatusCode;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpResponse, ResponseError};

use crate::errors::UrlshrtError;

impl ResponseError for UrlshrtError {
    fn status_code(&self) -> StatusCode {
        match self {
            UrlshrtError::DuplicateUrl { .. } | UrlshrtError::DuplicateUrls(_) => {
                StatusCode::CONFLICT
            }
            UrlshrtError::NotFound(_) => StatusCode::NOT_FOUND,
            UrlshrtError::Gone(_) => StatusCode::GONE,
            UrlshrtError::MalformedIdentifier(_) => StatusCode::BAD_REQUEST,
            UrlshrtError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // 内部错误不向客户端暴露细节
        let body = if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.message().to_string()
        };

        HttpResponse::build(status)
            .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
            .body(body)
    }
}

//! Mapping of `FpError` onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use fp_core::error::FpError;

use crate::response::ApiResponse;

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub FpError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            FpError::Validation(_) | FpError::Import(_) => StatusCode::BAD_REQUEST,
            FpError::NotFound { .. } => StatusCode::NOT_FOUND,
            FpError::Conflict(_) => StatusCode::CONFLICT,
            FpError::MissingConfig(_) => StatusCode::SERVICE_UNAVAILABLE,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FpError> for ApiError {
    fn from(e: FpError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            warn!("request rejected: {}", self.0);
        }
        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (FpError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (FpError::not_found("quote", 7), StatusCode::NOT_FOUND),
            (FpError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                FpError::Provider { provider: "twilio", status: 401, message: "bad".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (FpError::Timeout("slow".into()), StatusCode::BAD_GATEWAY),
            (FpError::Database("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}

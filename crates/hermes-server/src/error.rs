use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use hermes_core::error::AppError;

pub const FETCH_ERROR_MESSAGE: &str = "An error occurred while fetching data.";

/// Wrapper so we can implement `IntoResponse` for `AppError`.
///
/// Every error on the read path is a server error with a plain-text body;
/// the details only go to the log.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, FETCH_ERROR_MESSAGE).into_response()
    }
}

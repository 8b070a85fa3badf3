//! Mapping engine errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

use cube_common::{CubeError, ErrorKind};

/// Error returned by handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub CubeError);

impl From<CubeError> for ApiError {
    fn from(err: CubeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.0.kind() {
            ErrorKind::NotFound => debug!(error = %self.0, "Not found"),
            ErrorKind::Invalid => debug!(error = %self.0, "Rejected request"),
            ErrorKind::Internal => error!(error = %self.0, "Request failed"),
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

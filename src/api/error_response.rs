//! JSON error bodies for failed uploads
//!
//! A failed `POST /upload` answers with the [`ToHttpStatus`] status of its
//! [`Error`] and a `{"error": {"code", "message"}}` body. Storage-side
//! failures (500) carry a generic message so server paths never reach the
//! client; the handler logs the full error.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status_code, Json(ApiError::from(self))).into_response()
    }
}

//! Upload route handler

use super::public_host;
use crate::api::state::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

/// POST /upload - Store the multipart `file` field and return its public URL as text
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiError::new(
                        "invalid_multipart",
                        format!("Failed to read upload: {}", e),
                    )),
                )
                    .into_response();
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        return match state
            .host
            .save_upload(original_name.as_deref(), Box::pin(field))
            .await
        {
            Ok(stored) => {
                let url = state
                    .host
                    .public_url(&public_host(&headers, &state), &stored.file_name);
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    url,
                )
                    .into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "upload failed");
                e.into_response()
            }
        };
    }

    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(
            "missing_file",
            "No file provided in 'file' field",
        )),
    )
        .into_response()
}

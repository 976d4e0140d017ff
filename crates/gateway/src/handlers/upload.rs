//! Upload handler

use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::resolve_session_id;
use crate::AppState;
use lectern_common::errors::{AppError, Result};
use lectern_ingestion::parser::{file_extension, DocumentParser};

/// Upload response
#[derive(Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub file_id: Uuid,
    pub filename: String,
    pub chunk_count: usize,
    pub message: &'static str,
}

/// Accept a multipart document upload and run it through the ingestion
/// pipeline.
///
/// Expected parts: `file` (the document) and optionally `session_id`.
/// Unsupported extensions are rejected before any processing.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut session_field: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation {
        message: format!("invalid multipart body: {e}"),
        field: None,
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|f| f.to_string())
                    .ok_or_else(|| AppError::MissingField {
                        field: "file.filename".to_string(),
                    })?;
                let bytes = field.bytes().await.map_err(|e| AppError::Validation {
                    message: format!("failed to read upload: {e}"),
                    field: Some("file".to_string()),
                })?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("session_id") => {
                session_field = field.text().await.ok();
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| AppError::MissingField {
        field: "file".to_string(),
    })?;

    if !DocumentParser::is_supported(&filename) {
        return Err(AppError::UnsupportedFormat {
            extension: file_extension(&filename)
                .map(|e| format!(".{e}"))
                .unwrap_or_else(|| "(none)".to_string()),
        });
    }

    let session_id = resolve_session_id(&headers, session_field);

    let receipt = state
        .processor
        .process_upload(&bytes, &filename, &session_id)
        .await?;

    tracing::info!(
        session_id = %session_id,
        file_id = %receipt.file_id,
        filename = %receipt.filename,
        chunk_count = receipt.chunk_count,
        "Upload complete"
    );

    Ok(Json(UploadResponse {
        session_id,
        file_id: receipt.file_id,
        filename: receipt.filename,
        chunk_count: receipt.chunk_count,
        message: "File uploaded and processed successfully",
    }))
}

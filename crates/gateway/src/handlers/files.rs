//! File listing and removal handlers
//!
//! Deletions are idempotent and always succeed: unknown session or file
//! ids are no-ops. Deleting a file removes its record and raw storage only
//! — its chunks stay in the lexical index (documented limitation).

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::resolve_session_id;
use crate::AppState;
use lectern_common::models::FileSummary;

#[derive(Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileSummary>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// List the session's uploaded files
pub async fn list_files(State(state): State<AppState>, headers: HeaderMap) -> Json<FileListResponse> {
    let session_id = resolve_session_id(&headers, None);
    Json(FileListResponse {
        files: state.sessions.list_files(&session_id),
    })
}

/// Delete one uploaded file
pub async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<Uuid>,
) -> Json<MessageResponse> {
    let session_id = resolve_session_id(&headers, None);
    state.sessions.delete_file(&session_id, file_id);
    Json(MessageResponse {
        message: format!("File {file_id} deleted successfully"),
    })
}

/// Clear the whole session: files, storage, and chat history
pub async fn clear_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<MessageResponse> {
    let session_id = resolve_session_id(&headers, None);
    state.sessions.clear(&session_id);
    Json(MessageResponse {
        message: "Session cleared successfully".to_string(),
    })
}

//! Query handler

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::handlers::resolve_session_id;
use crate::AppState;
use lectern_common::errors::{AppError, Result};
use lectern_common::models::{ChatTurn, Paper, ScoredChunk};
use lectern_context::SourceFilter;

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,

    /// Retrieval sources to consult
    #[serde(default)]
    pub source: SourceFilter,

    pub session_id: Option<String>,

    /// JSON-serialized prior chat turns; replaces the stored history
    pub previous_messages: Option<String>,
}

/// Query response
#[derive(Serialize)]
pub struct QueryResponse {
    pub session_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_documents: Option<Vec<ScoredChunk>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_papers: Option<Vec<Paper>>,

    pub answer: String,
    pub chat_history: Vec<ChatTurn>,
}

/// Answer a question over the session's documents and/or external papers
pub async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let session_id = resolve_session_id(&headers, request.session_id.clone());

    // Malformed prior turns are ignored, not fatal
    let previous_messages = request.previous_messages.as_deref().and_then(|raw| {
        match serde_json::from_str::<Vec<ChatTurn>>(raw) {
            Ok(turns) => Some(turns),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse previous messages");
                None
            }
        }
    });

    let outcome = state
        .orchestrator
        .handle_query(&request.query, request.source, &session_id, previous_messages)
        .await;

    tracing::info!(
        session_id = %session_id,
        doc_hits = outcome.uploaded_documents.len(),
        paper_hits = outcome.online_papers.len(),
        "Query handled"
    );

    Ok(Json(QueryResponse {
        session_id,
        uploaded_documents: (!outcome.uploaded_documents.is_empty())
            .then_some(outcome.uploaded_documents),
        online_papers: (!outcome.online_papers.is_empty()).then_some(outcome.online_papers),
        answer: outcome.answer,
        chat_history: outcome.chat_history,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_defaults_to_both_sources() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"query": "what is attention?"}"#).unwrap();
        assert_eq!(request.source, SourceFilter::Both);
        assert!(request.session_id.is_none());
    }

    #[test]
    fn test_source_filter_deserializes_lowercase() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"query": "q", "source": "uploaded"}"#).unwrap();
        assert_eq!(request.source, SourceFilter::Uploaded);
    }

    #[test]
    fn test_empty_query_fails_validation() {
        let request: QueryRequest = serde_json::from_str(r#"{"query": ""}"#).unwrap();
        assert!(request.validate().is_err());
    }
}

//! Answer orchestration
//!
//! The per-query state machine: resolve the session, run the selected
//! retrieval sources sequentially, assemble context, pick the
//! evidence/greeting/general-knowledge path, generate the answer, and
//! append the exchange to the session history.

use crate::assembler::ContextAssembler;
use crate::llm::AnswerService;
use lectern_common::metrics;
use lectern_common::models::{ChatTurn, Paper, ScoredChunk};
use lectern_common::session::SessionStore;
use lectern_search::{AcademicSearch, LexicalIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Synthetic context for the greeting path
const GREETING_CONTEXT: &str = "The user is greeting you. Respond in a friendly manner.";

/// Queries that are plain greetings, matched against the trimmed
/// lower-cased query
const GREETINGS: &[&str] = &["hi", "hello", "hey", "hola", "what's up", "how are you"];

/// Which retrieval sources a query consults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFilter {
    Uploaded,
    Online,
    #[default]
    Both,
}

impl SourceFilter {
    pub fn includes_uploaded(&self) -> bool {
        matches!(self, SourceFilter::Uploaded | SourceFilter::Both)
    }

    pub fn includes_online(&self) -> bool {
        matches!(self, SourceFilter::Online | SourceFilter::Both)
    }
}

impl std::str::FromStr for SourceFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(SourceFilter::Uploaded),
            "online" => Ok(SourceFilter::Online),
            "both" => Ok(SourceFilter::Both),
            other => Err(format!("unknown source filter: {other}")),
        }
    }
}

/// Everything a query produces
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub answer: String,

    /// Full session history after this exchange was appended
    pub chat_history: Vec<ChatTurn>,

    /// Local document hits (empty when the filter excluded them)
    pub uploaded_documents: Vec<ScoredChunk>,

    /// External paper hits (empty when the filter excluded them)
    pub online_papers: Vec<Paper>,
}

/// Top-level decision logic for a query
pub struct AnswerOrchestrator {
    sessions: Arc<SessionStore>,
    index: Arc<LexicalIndex>,
    academic: Arc<AcademicSearch>,
    answerer: AnswerService,
    top_k: usize,
    max_paper_results: usize,
}

impl AnswerOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        index: Arc<LexicalIndex>,
        academic: Arc<AcademicSearch>,
        answerer: AnswerService,
        top_k: usize,
        max_paper_results: usize,
    ) -> Self {
        Self {
            sessions,
            index,
            academic,
            answerer,
            top_k,
            max_paper_results,
        }
    }

    /// Run one query through the full pipeline.
    ///
    /// Retrieval happens sequentially (documents, then papers); collaborator
    /// failures have already been degraded below this level, so this method
    /// always produces an answer and always records the exchange.
    #[instrument(skip(self, query, previous_messages), fields(session_id = %session_id, source = ?source))]
    pub async fn handle_query(
        &self,
        query: &str,
        source: SourceFilter,
        session_id: &str,
        previous_messages: Option<Vec<ChatTurn>>,
    ) -> QueryOutcome {
        // 1. Resolve the session; caller-supplied turns replace its history.
        self.sessions.get_or_create(session_id);
        if let Some(turns) = previous_messages {
            self.sessions.replace_history(session_id, turns);
        }
        let chat_history = self.sessions.history(session_id);

        // 2-3. Retrieval per source filter, uploaded first.
        let doc_hits = if source.includes_uploaded() {
            let started = Instant::now();
            let hits = self.index.search(query, self.top_k);
            metrics::record_search(started.elapsed().as_secs_f64(), hits.len());
            hits
        } else {
            Vec::new()
        };

        let paper_hits = if source.includes_online() {
            self.academic.search_all(query, self.max_paper_results).await
        } else {
            Vec::new()
        };

        // 4. Fuse evidence.
        let assembled = ContextAssembler::assemble(&doc_hits, &paper_hits, &chat_history);

        // 5. Pick the answering path.
        let answer = if assembled.has_evidence {
            self.answerer
                .answer_question(query, &assembled.context_text)
                .await
        } else if is_greeting(query) {
            self.answerer.answer_question(query, GREETING_CONTEXT).await
        } else {
            // General-knowledge path: recent chat (if any) plus the
            // citation block, which is empty without paper hits.
            let mut context = if chat_history.is_empty() {
                String::new()
            } else {
                ContextAssembler::chat_block(&chat_history)
            };
            context.push_str(&ContextAssembler::citation_block(&paper_hits));
            self.answerer.answer_question(query, &context).await
        };

        // 6. Record the exchange, fallback answers included.
        let chat_history = self.sessions.append_exchange(session_id, query, &answer);

        info!(
            doc_hits = doc_hits.len(),
            paper_hits = paper_hits.len(),
            evidence = assembled.has_evidence,
            "Query answered"
        );

        QueryOutcome {
            answer,
            chat_history,
            uploaded_documents: doc_hits,
            online_papers: paper_hits,
        }
    }
}

/// Whether the trimmed, lower-cased query is a plain greeting
fn is_greeting(query: &str) -> bool {
    let normalized = query.trim().to_lowercase();
    GREETINGS.contains(&normalized.as_str())
        || normalized.starts_with("hi ")
        || normalized.starts_with("hello ")
}

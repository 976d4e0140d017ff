//! Evidence context assembly
//!
//! Merges document hits, paper hits, and recent chat history into the
//! single context string handed to the answer provider, plus the citation
//! list. Chat history and citations are framing, not evidence:
//! `has_evidence` is true only when a document or paper block was produced.

use lectern_common::models::{ChatTurn, Paper, ScoredChunk};
use lectern_common::CHAT_CONTEXT_TURNS;

/// Result of context assembly
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// The full context string: evidence blocks, then the recent-chat
    /// block when history exists, then the citation block when papers
    /// exist.
    pub context_text: String,

    /// Whether at least one document or paper block was produced
    pub has_evidence: bool,
}

/// Formats retrieval output into answer-provider context
pub struct ContextAssembler;

impl ContextAssembler {
    /// Assemble the evidence-path context
    pub fn assemble(
        doc_hits: &[ScoredChunk],
        paper_hits: &[Paper],
        chat_history: &[ChatTurn],
    ) -> AssembledContext {
        let mut context = Self::format_documents(doc_hits);

        let paper_context = Self::format_papers(paper_hits);
        if !paper_context.is_empty() {
            if context.is_empty() {
                context = paper_context;
            } else {
                context.push_str("\n\n");
                context.push_str(&paper_context);
            }
        }

        let has_evidence = !context.is_empty();

        if !chat_history.is_empty() {
            context.push_str(&Self::chat_block(chat_history));
        }
        context.push_str(&Self::citation_block(paper_hits));

        AssembledContext {
            context_text: context,
            has_evidence,
        }
    }

    /// `[Document i: source (Page p)]` blocks, 1-based, joined by newlines
    pub fn format_documents(doc_hits: &[ScoredChunk]) -> String {
        let parts: Vec<String> = doc_hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                let page_info = hit
                    .chunk
                    .metadata
                    .page
                    .map(|p| format!(" (Page {p})"))
                    .unwrap_or_default();
                format!(
                    "[Document {}: {}{}]\n{}\n",
                    i + 1,
                    hit.chunk.metadata.source,
                    page_info,
                    hit.chunk.content
                )
            })
            .collect();

        parts.join("\n")
    }

    /// `[Paper i: title]` blocks with authors, provider, url, and summary
    pub fn format_papers(paper_hits: &[Paper]) -> String {
        let parts: Vec<String> = paper_hits
            .iter()
            .enumerate()
            .map(|(i, paper)| {
                format!(
                    "[Paper {}: {}]\nAuthors: {}\nSource: {}\nURL: {}\nSummary: {}\n",
                    i + 1,
                    paper.title,
                    paper.authors.join(", "),
                    paper.source,
                    paper.url,
                    paper.summary
                )
            })
            .collect();

        parts.join("\n")
    }

    /// The last few turns rendered under a "Previous conversation" heading
    pub fn chat_block(chat_history: &[ChatTurn]) -> String {
        let mut block = String::from("\n\nPrevious conversation:\n");
        let tail_start = chat_history.len().saturating_sub(CHAT_CONTEXT_TURNS);
        for turn in &chat_history[tail_start..] {
            block.push_str(&format!("{}: {}\n", turn.role.capitalized(), turn.content));
        }
        block
    }

    /// Numbered `[title](url)` list for citation, empty when no papers
    pub fn citation_block(paper_hits: &[Paper]) -> String {
        if paper_hits.is_empty() {
            return String::new();
        }

        let mut block = String::from("\n\nSource Information for Citation:\n");
        for (i, paper) in paper_hits.iter().enumerate() {
            block.push_str(&format!("{}. [{}]({})\n", i + 1, paper.title, paper.url));
        }
        block
    }
}

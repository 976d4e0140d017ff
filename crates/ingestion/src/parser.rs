//! Document parsing and chunking
//!
//! Dispatches on the original filename's extension and cuts each format
//! into chunks. Text-like formats (txt, docx) accumulate paragraphs under a
//! soft character cap; PDFs go through the structured extraction in
//! [`crate::pdf`].

use crate::docx;
use crate::errors::IngestionError;
use crate::pdf;
use lectern_common::models::{Chunk, ChunkKind, ChunkMetadata};
use std::path::Path;
use tracing::debug;

/// Extensions the parser recognizes
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];

/// Configuration for paragraph chunking
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Soft cap on accumulated characters per paragraph-group chunk
    pub max_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1000,
        }
    }
}

/// Parser for the supported document types (.pdf, .docx, .txt)
pub struct DocumentParser;

impl DocumentParser {
    /// Parse a stored document into chunks carrying the original filename
    /// as their `source`.
    pub fn parse(
        path: &Path,
        original_filename: &str,
        config: &ChunkerConfig,
    ) -> Result<Vec<Chunk>, IngestionError> {
        match file_extension(original_filename).as_deref() {
            Some("pdf") => pdf::parse_pdf(path, original_filename),
            Some("docx") => {
                let paragraphs = docx::extract_paragraphs(path)?;
                Ok(chunk_paragraphs(paragraphs, original_filename, config))
            }
            Some("txt") => {
                let bytes = std::fs::read(path)?;
                let text = String::from_utf8_lossy(&bytes);
                let paragraphs = text.split("\n\n").map(|p| p.to_string()).collect();
                Ok(chunk_paragraphs(paragraphs, original_filename, config))
            }
            other => Err(IngestionError::UnsupportedFormat {
                extension: other
                    .map(|e| format!(".{e}"))
                    .unwrap_or_else(|| "(none)".to_string()),
            }),
        }
    }

    /// Whether a filename's extension is in the recognized set
    pub fn is_supported(filename: &str) -> bool {
        file_extension(filename)
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false)
    }
}

/// Lowercased extension without the dot
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Accumulate paragraphs into chunks under the soft character cap.
///
/// A chunk is flushed when appending the next paragraph would push the
/// accumulated paragraph characters past the cap; the final non-empty
/// accumulator always flushes. Whitespace-only paragraphs are skipped and
/// never start a boundary. A single oversized paragraph still becomes its
/// own chunk.
pub fn chunk_paragraphs(
    paragraphs: Vec<String>,
    source: &str,
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for para in &paragraphs {
        if para.trim().is_empty() {
            continue;
        }
        let para_chars = para.chars().count();

        if current_chars + para_chars > config.max_chunk_chars && !current.is_empty() {
            chunks.push(Chunk::new(
                std::mem::take(&mut current),
                ChunkMetadata::new(source, ChunkKind::ParagraphGroup),
            ));
            current.push_str(para);
            current_chars = para_chars;
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(para);
            current_chars += para_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(Chunk::new(
            current,
            ChunkMetadata::new(source, ChunkKind::ParagraphGroup),
        ));
    }

    debug!(
        source = source,
        paragraph_count = paragraphs.len(),
        chunk_count = chunks.len(),
        "Paragraphs chunked"
    );

    chunks
}

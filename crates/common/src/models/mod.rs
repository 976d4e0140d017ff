//! Core data model shared across Lectern crates
//!
//! Chunks are the atomic retrieval unit: immutable once created, owned by
//! the lexical index after ingestion. Everything here is plain serde data;
//! behavior lives in the owning crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// The shape of content a chunk was cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Rendered document metadata (PDF Info dictionary)
    Metadata,
    /// Rendered table of contents
    Toc,
    /// Full text of one PDF page
    Page,
    /// One detected table on a page
    Table,
    /// Accumulated paragraphs from a text-like document
    ParagraphGroup,
}

/// Provenance attached to every chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Original filename the chunk was extracted from
    pub source: String,

    /// What kind of content this chunk holds
    #[serde(rename = "chunk_type")]
    pub kind: ChunkKind,

    /// 1-based page number (page and table chunks)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// 0-based index of the table on its page (table chunks only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_index: Option<usize>,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>, kind: ChunkKind) -> Self {
        Self {
            source: source.into(),
            kind,
            page: None,
            table_index: None,
        }
    }

    pub fn page(source: impl Into<String>, page: u32) -> Self {
        Self {
            source: source.into(),
            kind: ChunkKind::Page,
            page: Some(page),
            table_index: None,
        }
    }

    pub fn table(source: impl Into<String>, page: u32, table_index: usize) -> Self {
        Self {
            source: source.into(),
            kind: ChunkKind::Table,
            page: Some(page),
            table_index: Some(table_index),
        }
    }
}

/// A unit of normalized document content with attached provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique for the process lifetime
    pub id: Uuid,

    /// Normalized text content
    pub content: String,

    /// Provenance metadata
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a chunk with a fresh id
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            metadata,
        }
    }
}

/// A chunk returned from search, annotated with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,

    /// Fraction of query tokens matched, in `[0.0, 1.0]`
    pub score: f64,
}

/// An uploaded file tracked by a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: Uuid,

    /// Original filename as uploaded
    pub filename: String,

    /// Where the raw upload was stored on disk
    pub storage_path: PathBuf,

    /// Hex-encoded SHA-256 of the uploaded bytes
    pub checksum: String,

    /// When the upload was processed
    pub uploaded_at: DateTime<Utc>,

    /// Number of chunks produced at ingestion
    pub chunk_count: usize,

    /// Chunk ids placed in the lexical index, in emission order
    pub chunk_ids: Vec<Uuid>,
}

/// Listing row for an uploaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_id: Uuid,
    pub filename: String,
    pub chunk_count: usize,
}

impl From<&FileRecord> for FileSummary {
    fn from(record: &FileRecord) -> Self {
        Self {
            file_id: record.file_id,
            filename: record.filename.clone(),
            chunk_count: record.chunk_count,
        }
    }
}

/// Speaker of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalized display form used in assembled context
    pub fn capitalized(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One turn of conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An external paper returned by a search provider
///
/// Transient: produced per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,

    /// Publication date as the provider formats it (`YYYY-MM-DD` where known)
    pub published: String,

    pub url: String,

    /// Provider name, e.g. "arXiv" or "PubMed"
    pub source: String,

    /// Provider-scoped identifier
    pub id: String,
}

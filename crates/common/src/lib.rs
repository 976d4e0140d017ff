//! Lectern Common Library
//!
//! Shared code for all Lectern crates including:
//! - Core data model (chunks, files, sessions, papers)
//! - Session store
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod session;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{ChatTurn, Chunk, ChunkKind, ChunkMetadata, FileRecord, FileSummary, Paper, Role, ScoredChunk};
pub use session::{Session, SessionStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Results returned per document search unless configured otherwise
pub const DEFAULT_TOP_K: usize = 5;

/// Chat turns included when assembling conversational context
pub const CHAT_CONTEXT_TURNS: usize = 5;

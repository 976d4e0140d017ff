//! Upload processing pipeline
//!
//! Core logic for processing uploads: persist the raw bytes, parse into
//! chunks, place the chunks in the lexical index, and register the file
//! with its session.

use crate::errors::IngestionError;
use crate::parser::{file_extension, ChunkerConfig, DocumentParser};
use lectern_common::metrics;
use lectern_common::models::FileRecord;
use lectern_common::session::SessionStore;
use lectern_search::LexicalIndex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// What the caller gets back for a processed upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub file_id: Uuid,
    pub filename: String,
    pub chunk_count: usize,
}

/// Processes uploaded documents into the index and session registry
pub struct DocumentProcessor {
    sessions: Arc<SessionStore>,
    index: Arc<LexicalIndex>,
    upload_dir: PathBuf,
    chunking: ChunkerConfig,
}

impl DocumentProcessor {
    pub fn new(
        sessions: Arc<SessionStore>,
        index: Arc<LexicalIndex>,
        upload_dir: impl Into<PathBuf>,
        chunking: ChunkerConfig,
    ) -> Result<Self, IngestionError> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir)?;
        Ok(Self {
            sessions,
            index,
            upload_dir,
            chunking,
        })
    }

    /// Process one uploaded document end to end.
    ///
    /// The raw bytes are stored under a fresh file id, parsed per format,
    /// ingested into the index, and registered with the session. Parse
    /// failures leave no file record behind.
    #[instrument(skip(self, bytes), fields(filename = %filename, session_id = %session_id, size = bytes.len()))]
    pub async fn process_upload(
        &self,
        bytes: &[u8],
        filename: &str,
        session_id: &str,
    ) -> Result<UploadReceipt, IngestionError> {
        let started = Instant::now();

        let extension = file_extension(filename).ok_or_else(|| IngestionError::UnsupportedFormat {
            extension: "(none)".to_string(),
        })?;

        let file_id = Uuid::new_v4();
        let storage_path = self.upload_dir.join(format!("{file_id}.{extension}"));
        tokio::fs::write(&storage_path, bytes).await?;

        let checksum = hex::encode(Sha256::digest(bytes));

        let chunks = match DocumentParser::parse(&storage_path, filename, &self.chunking) {
            Ok(chunks) => chunks,
            Err(e) => {
                // Do not keep storage for documents we could not process.
                let _ = std::fs::remove_file(&storage_path);
                return Err(e);
            }
        };

        let chunk_count = chunks.len();
        let chunk_ids = self.index.ingest(chunks);

        self.sessions.register_file(
            session_id,
            FileRecord {
                file_id,
                filename: filename.to_string(),
                storage_path,
                checksum,
                uploaded_at: chrono::Utc::now(),
                chunk_count,
                chunk_ids,
            },
        );

        metrics::record_ingestion(started.elapsed().as_secs_f64(), chunk_count, &extension);
        info!(
            file_id = %file_id,
            chunk_count = chunk_count,
            "File uploaded and processed"
        );

        Ok(UploadReceipt {
            file_id,
            filename: filename.to_string(),
            chunk_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(dir: &std::path::Path) -> (DocumentProcessor, Arc<SessionStore>, Arc<LexicalIndex>) {
        let sessions = Arc::new(SessionStore::new());
        let index = Arc::new(LexicalIndex::new());
        let processor = DocumentProcessor::new(
            sessions.clone(),
            index.clone(),
            dir.join("uploads"),
            ChunkerConfig::default(),
        )
        .unwrap();
        (processor, sessions, index)
    }

    #[tokio::test]
    async fn test_upload_indexes_and_registers() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, sessions, index) = processor(dir.path());

        let receipt = processor
            .process_upload(b"tardigrades survive extreme vacuum\n\nthey also endure radiation", "biology.txt", "s1")
            .await
            .unwrap();

        assert_eq!(receipt.filename, "biology.txt");
        assert_eq!(receipt.chunk_count, 1);
        assert_eq!(index.len(), 1);

        let files = sessions.list_files("s1");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].chunk_count, 1);

        let hits = index.search("tardigrades", 5);
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_stores_raw_bytes_and_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, sessions, _index) = processor(dir.path());

        processor
            .process_upload(b"some text", "notes.txt", "s1")
            .await
            .unwrap();

        let session = sessions.get_or_create("s1");
        let record = session.files.values().next().unwrap();
        assert!(record.storage_path.exists());
        assert_eq!(record.checksum.len(), 64);
        assert_eq!(std::fs::read(&record.storage_path).unwrap(), b"some text");
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected_without_record() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, sessions, index) = processor(dir.path());

        let err = processor
            .process_upload(b"body", "notes.md", "s1")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::UnsupportedFormat { .. }));
        assert!(sessions.list_files("s1").is_empty());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_parse_failure_cleans_up_storage() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, sessions, _index) = processor(dir.path());

        let err = processor
            .process_upload(b"definitely not a zip archive", "report.docx", "s1")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::DocxParseError(_)));
        assert!(sessions.list_files("s1").is_empty());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("uploads"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_deleting_file_leaves_postings_searchable() {
        // The documented stale-postings limitation: the record and storage
        // go away, the indexed content does not.
        let dir = tempfile::tempdir().unwrap();
        let (processor, sessions, index) = processor(dir.path());

        let receipt = processor
            .process_upload(b"xylophone maintenance schedule", "music.txt", "s1")
            .await
            .unwrap();

        let removed = sessions.delete_file("s1", receipt.file_id);
        assert!(removed.is_some());
        assert!(!removed.unwrap().storage_path.exists());
        assert!(sessions.list_files("s1").is_empty());

        let hits = index.search("xylophone", 5);
        assert_eq!(hits.len(), 1, "postings are expected to outlive the file record");
    }
}

//! Per-session chat and upload state
//!
//! Sessions are created lazily on first use of an id and destroyed only by
//! an explicit clear. The store is the single shared owner of this state:
//! handlers receive it by `Arc` and get value copies back, never references
//! into the map. Callers are expected to serialize requests per session;
//! concurrent writers to the same session are last-writer-wins.

use crate::models::{ChatTurn, FileRecord, FileSummary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// State for one conversational session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,

    /// Strict append-order conversation history
    pub chat_history: Vec<ChatTurn>,

    /// Uploaded files registered to this session
    pub files: HashMap<Uuid, FileRecord>,
}

/// Process-wide registry of sessions
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a copy of the session, creating empty state on first sight of the id
    pub fn get_or_create(&self, session_id: &str) -> Session {
        let mut sessions = self.inner.write().unwrap();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                session_id: session_id.to_string(),
                ..Session::default()
            })
            .clone()
    }

    /// Register an uploaded file with a session
    pub fn register_file(&self, session_id: &str, record: FileRecord) {
        let mut sessions = self.inner.write().unwrap();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                session_id: session_id.to_string(),
                ..Session::default()
            });
        session.files.insert(record.file_id, record);
    }

    /// List uploaded files for a session; unknown sessions yield an empty list
    pub fn list_files(&self, session_id: &str) -> Vec<FileSummary> {
        let sessions = self.inner.read().unwrap();
        sessions
            .get(session_id)
            .map(|s| s.files.values().map(FileSummary::from).collect())
            .unwrap_or_default()
    }

    /// Remove a file record and its backing storage.
    ///
    /// Storage-removal failures are logged, not raised. Unknown session or
    /// file ids are no-ops. The file's postings stay in the lexical index;
    /// only the record and the raw upload go away.
    pub fn delete_file(&self, session_id: &str, file_id: Uuid) -> Option<FileRecord> {
        let removed = {
            let mut sessions = self.inner.write().unwrap();
            sessions
                .get_mut(session_id)
                .and_then(|s| s.files.remove(&file_id))
        };

        if let Some(ref record) = removed {
            remove_storage(record);
            tracing::info!(
                session_id = %session_id,
                file_id = %file_id,
                filename = %record.filename,
                "File deleted"
            );
        }

        removed
    }

    /// Remove every file's storage and drop the session entirely, chat
    /// history included. Idempotent: unknown ids succeed silently.
    pub fn clear(&self, session_id: &str) {
        let removed = {
            let mut sessions = self.inner.write().unwrap();
            sessions.remove(session_id)
        };

        if let Some(session) = removed {
            for record in session.files.values() {
                remove_storage(record);
            }
            tracing::info!(
                session_id = %session_id,
                files = session.files.len(),
                turns = session.chat_history.len(),
                "Session cleared"
            );
        }
    }

    /// Copy of the session's chat history; unknown sessions yield empty
    pub fn history(&self, session_id: &str) -> Vec<ChatTurn> {
        let sessions = self.inner.read().unwrap();
        sessions
            .get(session_id)
            .map(|s| s.chat_history.clone())
            .unwrap_or_default()
    }

    /// Replace the session's history with caller-supplied prior turns
    pub fn replace_history(&self, session_id: &str, turns: Vec<ChatTurn>) {
        let mut sessions = self.inner.write().unwrap();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                session_id: session_id.to_string(),
                ..Session::default()
            });
        session.chat_history = turns;
    }

    /// Append a completed question/answer exchange and return the full history
    pub fn append_exchange(&self, session_id: &str, query: &str, answer: &str) -> Vec<ChatTurn> {
        let mut sessions = self.inner.write().unwrap();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                session_id: session_id.to_string(),
                ..Session::default()
            });
        session.chat_history.push(ChatTurn::user(query));
        session.chat_history.push(ChatTurn::assistant(answer));
        session.chat_history.clone()
    }
}

fn remove_storage(record: &FileRecord) {
    if let Err(e) = std::fs::remove_file(&record.storage_path) {
        tracing::warn!(
            path = %record.storage_path.display(),
            error = %e,
            "Failed to remove uploaded file storage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use std::path::PathBuf;

    fn record(filename: &str, path: PathBuf) -> FileRecord {
        FileRecord {
            file_id: Uuid::new_v4(),
            filename: filename.to_string(),
            storage_path: path,
            checksum: "deadbeef".into(),
            uploaded_at: chrono::Utc::now(),
            chunk_count: 2,
            chunk_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
        }
    }

    #[test]
    fn test_get_or_create_is_lazy() {
        let store = SessionStore::new();
        let session = store.get_or_create("s1");
        assert_eq!(session.session_id, "s1");
        assert!(session.chat_history.is_empty());
        assert!(session.files.is_empty());
    }

    #[test]
    fn test_list_files_unknown_session_is_empty() {
        let store = SessionStore::new();
        assert!(store.list_files("nope").is_empty());
    }

    #[test]
    fn test_register_and_list_files() {
        let store = SessionStore::new();
        store.register_file("s1", record("a.txt", PathBuf::from("/tmp/does-not-exist-a")));
        store.register_file("s1", record("b.pdf", PathBuf::from("/tmp/does-not-exist-b")));

        let files = store.list_files("s1");
        assert_eq!(files.len(), 2);
        let mut names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.pdf"]);
    }

    #[test]
    fn test_delete_file_removes_record_and_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.txt");
        std::fs::write(&path, b"content").unwrap();

        let store = SessionStore::new();
        let rec = record("upload.txt", path.clone());
        let file_id = rec.file_id;
        store.register_file("s1", rec);

        let removed = store.delete_file("s1", file_id);
        assert!(removed.is_some());
        assert!(!path.exists());
        assert!(store.list_files("s1").is_empty());
    }

    #[test]
    fn test_delete_unknown_file_is_noop() {
        let store = SessionStore::new();
        assert!(store.delete_file("s1", Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_delete_survives_missing_storage() {
        let store = SessionStore::new();
        let rec = record("gone.txt", PathBuf::from("/tmp/lectern-missing-file"));
        let file_id = rec.file_id;
        store.register_file("s1", rec);

        // Storage path does not exist; removal failure is logged, not raised.
        assert!(store.delete_file("s1", file_id).is_some());
    }

    #[test]
    fn test_clear_drops_history_and_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, b"content").unwrap();

        let store = SessionStore::new();
        store.register_file("s1", record("doc.txt", path.clone()));
        store.append_exchange("s1", "hello", "hi there");

        store.clear("s1");
        assert!(!path.exists());
        assert!(store.list_files("s1").is_empty());
        assert!(store.history("s1").is_empty());

        // Idempotent
        store.clear("s1");
    }

    #[test]
    fn test_append_exchange_preserves_order() {
        let store = SessionStore::new();
        store.append_exchange("s1", "first question", "first answer");
        let history = store.append_exchange("s1", "second question", "second answer");

        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "first question");
        assert_eq!(history[3].role, Role::Assistant);
        assert_eq!(history[3].content, "second answer");
    }

    #[test]
    fn test_replace_history() {
        let store = SessionStore::new();
        store.append_exchange("s1", "old", "old answer");
        store.replace_history("s1", vec![ChatTurn::user("restored")]);

        let history = store.history("s1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "restored");
    }
}

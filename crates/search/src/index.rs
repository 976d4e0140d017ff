//! Lexical inverted-index search over document chunks
//!
//! A deliberately simple bag-of-words overlap ranker: a chunk's score is
//! the fraction of query tokens whose posting list contains it. This is the
//! documented retrieval contract — no TF-IDF or BM25 weighting — and the
//! behavior callers and tests pin down, including stable tie ordering.
//!
//! The index owns its chunks after ingestion. Search hands out clones, so
//! callers can never mutate indexed content through a result.

use lectern_common::errors::Result;
use lectern_common::models::{Chunk, ScoredChunk};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{OnceLock, RwLock};
use tracing::info;
use uuid::Uuid;

/// Common English function words dropped during tokenization
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "because", "as", "what",
    "when", "where", "how", "why", "which", "who", "whom", "this", "that",
    "these", "those", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "can", "could", "will",
    "would", "shall", "should", "may", "might", "must", "to", "of", "in",
    "for", "on", "by", "at", "with", "about", "against", "between", "into",
    "through", "during", "before", "after", "above", "below", "from", "up",
    "down", "out", "off", "over", "under", "again", "further", "then",
    "once", "here", "there", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own",
    "same", "so", "than", "too", "very", "s", "t", "just", "don", "now",
];

fn non_word() -> &'static Regex {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    NON_WORD.get_or_init(|| Regex::new(r"[^\w\s]").expect("static regex"))
}

fn is_stop_word(token: &str) -> bool {
    static SET: OnceLock<std::collections::HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
        .contains(token)
}

/// Tokenize text: lowercase, strip punctuation to spaces, split on
/// whitespace, drop stop words. Deterministic and idempotent.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = non_word().replace_all(&lowered, " ");
    cleaned
        .split_whitespace()
        .filter(|token| !is_stop_word(token))
        .map(|token| token.to_string())
        .collect()
}

/// The serialized unit: postings, chunk store, and insertion order travel
/// together so a restored index is behaviorally identical to the saved one.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexState {
    /// token -> chunk ids, first-seen order, no duplicates per token
    postings: HashMap<String, Vec<Uuid>>,

    /// chunk id -> chunk
    chunks: HashMap<Uuid, Chunk>,

    /// chunk ids in ingestion order
    insertion_order: Vec<Uuid>,
}

/// In-memory inverted-index search engine
#[derive(Debug, Default)]
pub struct LexicalIndex {
    state: RwLock<IndexState>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest chunks, returning the assigned ids in order. No-op on empty
    /// input.
    pub fn ingest(&self, chunks: Vec<Chunk>) -> Vec<Uuid> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let mut state = self.state.write().unwrap();
        let mut ids = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let id = chunk.id;
            for token in tokenize(&chunk.content) {
                let posting = state.postings.entry(token).or_default();
                if !posting.contains(&id) {
                    posting.push(id);
                }
            }
            state.insertion_order.push(id);
            state.chunks.insert(id, chunk);
            ids.push(id);
        }

        info!(count = ids.len(), "Chunks added to lexical index");
        ids
    }

    /// Rank chunks by query-token overlap.
    ///
    /// score = matched query tokens / query token count (an empty
    /// tokenization counts as 1 to avoid dividing by zero). Ties keep the
    /// order in which a chunk was first counted, which for a single-token
    /// query is posting-list order, i.e. ingestion order. Returns an empty
    /// list when the index holds no chunks.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let state = self.state.read().unwrap();
        if state.insertion_order.is_empty() {
            return Vec::new();
        }

        let query_tokens = tokenize(query);

        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        let mut first_touch: HashMap<Uuid, usize> = HashMap::new();

        for token in &query_tokens {
            if let Some(posting) = state.postings.get(token) {
                for &id in posting {
                    let next_touch = first_touch.len();
                    first_touch.entry(id).or_insert(next_touch);
                    *counts.entry(id).or_insert(0) += 1;
                }
            }
        }

        let query_len = query_tokens.len().max(1);

        let mut ranked: Vec<(Uuid, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| first_touch[&a.0].cmp(&first_touch[&b.0])));
        ranked.truncate(top_k);

        ranked
            .into_iter()
            .map(|(id, count)| ScoredChunk {
                chunk: state.chunks[&id].clone(),
                score: count as f64 / query_len as f64,
            })
            .collect()
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.state.read().unwrap().insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all state
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        *state = IndexState::default();
    }

    /// Serialize the whole index as one snapshot unit
    pub fn persist(&self, path: &Path) -> Result<()> {
        let state = self.state.read().unwrap();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &*state)?;
        info!(path = %path.display(), chunks = state.insertion_order.len(), "Index persisted");
        Ok(())
    }

    /// Rebuild an index from a snapshot written by [`persist`](Self::persist)
    pub fn restore(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let state: IndexState = serde_json::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), chunks = state.insertion_order.len(), "Index restored");
        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_common::models::{ChunkKind, ChunkMetadata};

    fn chunk(content: &str) -> Chunk {
        Chunk::new(content, ChunkMetadata::new("test.txt", ChunkKind::ParagraphGroup))
    }

    #[test]
    fn test_tokenize_is_deterministic_and_idempotent() {
        let text = "The Quick, brown FOX! jumps-over the lazy dog.";
        let first = tokenize(text);
        let second = tokenize(text);
        assert_eq!(first, second);
        assert_eq!(first, vec!["quick", "brown", "fox", "jumps", "lazy", "dog"]);

        let retokenized = tokenize(&first.join(" "));
        assert_eq!(retokenized, first);
    }

    #[test]
    fn test_stop_words_never_survive() {
        let tokens = tokenize("the and of with about once again");
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = LexicalIndex::new();
        assert!(index.search("anything", 5).is_empty());
    }

    #[test]
    fn test_ingest_empty_is_noop() {
        let index = LexicalIndex::new();
        assert!(index.ingest(vec![]).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_unique_term_ranks_its_chunk_first() {
        let index = LexicalIndex::new();
        index.ingest(vec![
            chunk("neural networks process signals"),
            chunk("volcanic eruptions shape landscapes"),
            chunk("networks of roads cross the country"),
        ]);

        let results = index.search("volcanic", 5);
        assert_eq!(results.len(), 1);
        assert!(results[0].chunk.content.contains("volcanic"));
        assert!((results[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_matched_fraction_of_query_tokens() {
        let index = LexicalIndex::new();
        index.ingest(vec![chunk("transformers use attention layers")]);

        // 1 of 2 non-stop-word tokens matches
        let results = index.search("attention pooling", 5);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_monotonic_in_matched_tokens() {
        let index = LexicalIndex::new();
        index.ingest(vec![
            chunk("alpha beta gamma"),
            chunk("alpha beta delta"),
            chunk("alpha epsilon zeta"),
        ]);

        let results = index.search("alpha beta gamma", 5);
        assert_eq!(results.len(), 3);
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
        assert!((results[0].score - 1.0).abs() < 1e-9);
        assert!(results[0].chunk.content.contains("gamma"));
    }

    #[test]
    fn test_ties_keep_ingestion_order() {
        let index = LexicalIndex::new();
        let ids = index.ingest(vec![
            chunk("shared keyword appears early"),
            chunk("shared keyword appears later"),
        ]);

        let results = index.search("keyword", 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, ids[0]);
        assert_eq!(results[1].chunk.id, ids[1]);
        assert!((results[0].score - results[1].score).abs() < 1e-9);
    }

    #[test]
    fn test_top_k_respected() {
        let index = LexicalIndex::new();
        index.ingest(
            (0..10)
                .map(|i| chunk(&format!("common term document {i}")))
                .collect(),
        );

        assert_eq!(index.search("common", 3).len(), 3);
        assert_eq!(index.search("common", 100).len(), 10);
    }

    #[test]
    fn test_posting_lists_deduplicate() {
        let index = LexicalIndex::new();
        index.ingest(vec![chunk("echo echo echo echo")]);

        let results = index.search("echo", 5);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_query_matches_nothing_without_panic() {
        let index = LexicalIndex::new();
        index.ingest(vec![chunk("content")]);
        assert!(index.search("", 5).is_empty());
        assert!(index.search("the and of", 5).is_empty());
    }

    #[test]
    fn test_search_returns_copies() {
        let index = LexicalIndex::new();
        index.ingest(vec![chunk("original content")]);

        let mut results = index.search("original", 5);
        results[0].chunk.content = "mutated".to_string();

        let fresh = index.search("original", 5);
        assert_eq!(fresh[0].chunk.content, "original content");
    }

    #[test]
    fn test_persist_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let index = LexicalIndex::new();
        index.ingest(vec![
            chunk("rust ownership and borrowing"),
            chunk("garbage collection pauses"),
            chunk("borrowing rules prevent races"),
        ]);

        index.persist(&path).unwrap();
        let restored = LexicalIndex::restore(&path).unwrap();

        for query in ["borrowing", "garbage collection", "rust races", "nothing matches here"] {
            let original: Vec<(Uuid, u64)> = index
                .search(query, 5)
                .into_iter()
                .map(|r| (r.chunk.id, r.score.to_bits()))
                .collect();
            let roundtrip: Vec<(Uuid, u64)> = restored
                .search(query, 5)
                .into_iter()
                .map(|r| (r.chunk.id, r.score.to_bits()))
                .collect();
            assert_eq!(original, roundtrip, "query {query:?} diverged after restore");
        }
    }

    #[test]
    fn test_clear_drops_everything() {
        let index = LexicalIndex::new();
        index.ingest(vec![chunk("something")]);
        index.clear();
        assert!(index.is_empty());
        assert!(index.search("something", 5).is_empty());
    }

    #[test]
    fn test_stale_postings_survive_file_delete() {
        // Deleting a file removes its record and storage but not its
        // postings; former content stays searchable. Current behavior,
        // asserted on purpose.
        let index = LexicalIndex::new();
        let ids = index.ingest(vec![chunk("unmistakable zanzibar reference")]);

        // The file-level delete never reaches into the index.
        let results = index.search("zanzibar", 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, ids[0]);
    }
}

//! Lectern Search
//!
//! Two retrieval paths feed the answer pipeline:
//! - a lexical inverted index over uploaded document chunks (`index`)
//! - external academic paper providers, arXiv and PubMed, merged by
//!   round-robin interleave (`academic`)

pub mod academic;
pub mod index;

pub use academic::{AcademicSearch, PaperProvider, ProviderError};
pub use index::{tokenize, LexicalIndex};

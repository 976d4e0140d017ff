//! Lectern Context Engine
//!
//! Fuses retrieved evidence into a single answer-generation context and
//! decides which path a query takes:
//! - `assembler` formats document hits, paper hits, chat history, and
//!   citations into one evidence string
//! - `llm` holds the answer-provider trait and the chat-completions client
//!   with its retry policy
//! - `fallback` is the local extractive answerer used when the provider is
//!   unavailable
//! - `postprocess` normalizes generated answers
//! - `orchestrator` runs the per-query state machine

pub mod assembler;
pub mod fallback;
pub mod llm;
pub mod orchestrator;
pub mod postprocess;

pub use assembler::{AssembledContext, ContextAssembler};
pub use llm::{AnswerError, AnswerProvider, AnswerService, ChatCompletionsAnswerer, MockAnswerProvider};
pub use orchestrator::{AnswerOrchestrator, QueryOutcome, SourceFilter};

//! # Tagmatch Core
//!
//! Library for comparing two annotated text corpora by contextual token
//! embeddings, measuring how their label schemes relate.
//!
//! The comparison pipeline reads both corpora, retrieves a per-token
//! embedding matrix for each from an embedding provider, then matches
//! every token in one corpus against its nearest neighbor in the other,
//! accumulating a label-confusion matrix in both directions.
//!
//! ## Modules
//!
//! - [`corpus`] - Token/label interning and sentence structure
//! - [`embedding`] - Embedding provider contract and remote service client
//! - [`matching`] - Bidirectional nearest-neighbor confusion matrices
//! - [`compare`] - Orchestrator wiring corpora, provider, and engine
//! - [`config`] - Production configuration constants
//! - [`error`] - Error types for protocol, corpus, and matching failures
//! - [`progress`] - Monotonic `(completed, total)` progress reporting

pub mod compare;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod matching;
pub mod progress;

pub use compare::{run_comparison, ComparisonReport};
pub use corpus::{Corpus, SentenceSource, TaggedSentence};
pub use embedding::{EmbeddingMatrix, EmbeddingProvider, ServiceClient};
pub use matching::{ConfusionPair, MatchOutcome, MatchingEngine};

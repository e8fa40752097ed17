//! Corpus construction: token/label interning and sentence structure.
//!
//! A [`Corpus`] is built in three phases. During the read phase the
//! builder consumes sentences from an external [`SentenceSource`],
//! copying tokens into an arena and assigning dense label ids in
//! first-seen order. `end_reading` freezes the corpus and allocates the
//! embedding matrix; `embed` fills it through an
//! [`EmbeddingProvider`](crate::embedding::EmbeddingProvider).

mod arena;
mod dataset;
mod labels;
mod source;

pub use arena::StringArena;
pub use dataset::Corpus;
pub use labels::LabelMap;
pub use source::{SentenceSource, TaggedSentence, VecSource};

//! Boundary trait for external corpus parsers.
//!
//! The ~20 real corpus-file parsers live outside this crate. Each
//! exposes its file as a lazy, sentence-segmented sequence of
//! `(word, tag)` pairs; the corpus builder only iterates and never
//! assumes a file format.

use crate::error::SourceError;

/// One sentence of `(word, tag)` pairs drawn from a parser.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaggedSentence {
    /// Tokens in surface order, each paired with its tag string.
    pub tokens: Vec<(String, String)>,
}

impl TaggedSentence {
    /// Builds a sentence from `(word, tag)` string pairs.
    pub fn new<W, T>(pairs: impl IntoIterator<Item = (W, T)>) -> Self
    where
        W: Into<String>,
        T: Into<String>,
    {
        Self {
            tokens: pairs
                .into_iter()
                .map(|(w, t)| (w.into(), t.into()))
                .collect(),
        }
    }

    /// True if the sentence carries no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Lazy sentence-segmented view of one corpus file.
///
/// Implementations yield sentences until the file is exhausted
/// (`Ok(None)`). A parse failure ends the file; the orchestrator logs
/// it and moves on to the next file.
pub trait SentenceSource {
    /// Returns the next sentence, or `None` at end of input.
    fn next_sentence(&mut self) -> Result<Option<TaggedSentence>, SourceError>;
}

/// In-memory source over pre-built sentences, for tests and fixtures.
pub struct VecSource {
    sentences: std::vec::IntoIter<TaggedSentence>,
}

impl VecSource {
    /// Wraps a vector of sentences.
    pub fn new(sentences: Vec<TaggedSentence>) -> Self {
        Self {
            sentences: sentences.into_iter(),
        }
    }
}

impl SentenceSource for VecSource {
    fn next_sentence(&mut self) -> Result<Option<TaggedSentence>, SourceError> {
        Ok(self.sentences.next())
    }
}

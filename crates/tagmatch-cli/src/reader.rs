//! Tab-separated corpus reader.
//!
//! One `word<TAB>tag` pair per line, blank line between sentences. This
//! is the reference parser for the `SentenceSource` boundary; the real
//! corpus formats each ship their own implementation.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tagmatch_core::corpus::{SentenceSource, TaggedSentence};
use tagmatch_core::error::SourceError;

/// Lazy reader over one tab-separated corpus file.
pub struct TsvReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl TsvReader<BufReader<File>> {
    /// Opens a file for sentence-at-a-time reading.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_reader(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> TsvReader<R> {
    /// Wraps any buffered reader; used by tests with in-memory input.
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> SentenceSource for TsvReader<R> {
    fn next_sentence(&mut self) -> Result<Option<TaggedSentence>, SourceError> {
        let mut sentence = TaggedSentence::default();
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line?;
            if line.trim().is_empty() {
                if !sentence.is_empty() {
                    return Ok(Some(sentence));
                }
                continue;
            }
            let (word, tag) = line.split_once('\t').ok_or_else(|| SourceError::Parse {
                line: self.line_no,
                message: format!("expected word<TAB>tag, got '{line}'"),
            })?;
            if word.is_empty() || tag.is_empty() {
                return Err(SourceError::Parse {
                    line: self.line_no,
                    message: "empty word or tag column".to_string(),
                });
            }
            sentence.tokens.push((word.to_string(), tag.to_string()));
        }
        if sentence.is_empty() {
            Ok(None)
        } else {
            Ok(Some(sentence))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(input: &str) -> Result<Vec<TaggedSentence>, SourceError> {
        let mut reader = TsvReader::from_reader(Cursor::new(input.to_string()));
        let mut sentences = Vec::new();
        while let Some(sentence) = reader.next_sentence()? {
            sentences.push(sentence);
        }
        Ok(sentences)
    }

    #[test]
    fn test_sentences_split_on_blank_lines() {
        let sentences = read_all("the\tDET\ncat\tNOUN\n\nran\tVERB\n").unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].tokens.len(), 2);
        assert_eq!(sentences[1].tokens[0], ("ran".to_string(), "VERB".to_string()));
    }

    #[test]
    fn test_trailing_sentence_without_blank_line() {
        let sentences = read_all("cat\tNOUN").unwrap();
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_consecutive_blank_lines_ignored() {
        let sentences = read_all("a\tX\n\n\n\nb\tY\n\n").unwrap();
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_missing_tab_is_parse_error() {
        let err = read_all("cat NOUN\n").unwrap_err();
        assert!(matches!(err, SourceError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_empty_input_yields_no_sentences() {
        assert!(read_all("").unwrap().is_empty());
    }
}

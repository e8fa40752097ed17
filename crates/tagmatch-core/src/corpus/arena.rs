//! Append-only string storage for corpus tokens.

/// Byte range of one interned string inside the arena buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    offset: u32,
    len: u32,
}

/// Append-only arena of interned strings.
///
/// Tokens are copied into one contiguous buffer so the originating file
/// buffers can be released as soon as a sentence has been read. Spans
/// are handed back as compact `(offset, len)` pairs; resolution is a
/// bounds-checked slice into the shared buffer.
///
/// The arena never deduplicates: the same word appearing twice occupies
/// two spans. Corpus token sequences are positional, so interning by
/// identity would only complicate span bookkeeping.
#[derive(Debug, Default)]
pub struct StringArena {
    buf: String,
}

impl StringArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `s` into the arena and returns its span.
    pub fn intern(&mut self, s: &str) -> Span {
        let offset = self.buf.len() as u32;
        self.buf.push_str(s);
        Span {
            offset,
            len: s.len() as u32,
        }
    }

    /// Resolves a span back to its string.
    pub fn resolve(&self, span: Span) -> &str {
        let start = span.offset as usize;
        &self.buf[start..start + span.len as usize]
    }

    /// Total interned bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Shrinks the backing buffer to fit.
    pub fn shrink_to_fit(&mut self) {
        self.buf.shrink_to_fit();
    }
}

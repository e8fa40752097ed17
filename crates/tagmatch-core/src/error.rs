//! Error types for tagmatch-core.
//!
//! Protocol violations are fatal by design: they indicate an
//! incompatible or misbehaving embedding server and there is no safe
//! recovery, so nothing in the embedding hot path retries. Per-file
//! parse errors, by contrast, are caught at the orchestrator boundary
//! and the offending file is skipped.

use thiserror::Error;

/// Errors raised by the embedding service wire protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O failure on the command or result stream
    #[error("embedding channel I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// Frame structure could not be parsed
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// A frame part exceeded the configured receive budget
    #[error("frame part of {got} bytes exceeds the {limit} byte budget")]
    OversizedPart { got: usize, limit: usize },
    /// The handshake configuration blob could not be parsed
    #[error("malformed server configuration: {0}")]
    BadConfig(String),
    /// The server returns pooled sentence vectors; per-token mode is required
    #[error("server pooling is '{0}', per-token mode (pooling NONE) is required")]
    PooledServer(String),
    /// Response carried an unexpected element dtype
    #[error("response dtype '{0}' is not float32")]
    DtypeMismatch(String),
    /// Response shape disagrees with the submitted batch
    #[error("response shape {got:?} does not match expected {expected:?}")]
    ShapeMismatch {
        got: [usize; 3],
        expected: [usize; 3],
    },
    /// Response carried a request id outside the current session
    #[error("response for unknown request id {0}")]
    UnknownRequest(u64),
    /// Two responses arrived for the same request id
    #[error("duplicate response for request id {0}")]
    DuplicateResponse(u64),
    /// Response identity does not match this client
    #[error("response identity does not match this client")]
    IdentityMismatch,
}

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Fatal wire protocol violation
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// A session was started while another is active
    #[error("an embedding session is already active")]
    SessionActive,
    /// A session operation was issued with no active session
    #[error("no active embedding session")]
    NoSession,
    /// Fewer batches were submitted than the session was sized for
    #[error("session expected {expected} batches but only {submitted} were submitted")]
    IncompleteSession { submitted: usize, expected: usize },
    /// A batch would write past the end of the destination matrix
    #[error("batch of {rows} rows at offset {offset} overflows {capacity}-row destination")]
    DestinationOverflow {
        rows: usize,
        offset: usize,
        capacity: usize,
    },
    /// A sentence exceeds the server's fixed sequence length
    #[error("sentence of {tokens} tokens exceeds the server limit of {limit}")]
    SentenceTooLong { tokens: usize, limit: usize },
    /// More batches were submitted than the session was sized for
    #[error("session was sized for {expected} batches; extra batch rejected")]
    ExcessBatch { expected: usize },
    /// The receiver worker stopped before the session completed; the
    /// cause is reported by `end_session`
    #[error("receiver worker exited early")]
    WorkerExited,
    /// The background receiver worker panicked
    #[error("receiver worker panicked")]
    WorkerPanicked,
}

/// Errors raised by external corpus parsers at the source boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    /// I/O failure while reading the underlying file
    #[error("source I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// A line could not be parsed as a (word, tag) pair
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Errors raised while building or embedding a corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// `read` was called after `end_reading`
    #[error("corpus is frozen; no further reading is allowed")]
    Frozen,
    /// An embedding operation was issued before `end_reading`
    #[error("corpus is still in the read phase")]
    NotFrozen,
    /// More distinct tags than label ids can address
    #[error("label capacity exhausted: more than {0} distinct tags")]
    LabelOverflow(usize),
    /// The external parser failed
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The embedding provider failed
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Errors raised by the matching engine.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The two corpora carry embeddings of different dimension
    #[error("embedding dimensions differ: {0} vs {1}")]
    DimensionMismatch(usize, usize),
    /// A corpus has not been embedded yet
    #[error("corpus '{0}' has no embedding matrix")]
    NotEmbedded(String),
}

/// Errors raised by the comparison orchestrator.
#[derive(Debug, Error)]
pub enum CompareError {
    /// Corpus construction or embedding failed
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    /// The matching engine failed
    #[error(transparent)]
    Match(#[from] MatchError),
}

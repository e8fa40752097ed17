//! The embedding provider contract.

use super::matrix::EmbeddingMatrix;
use crate::error::EmbeddingError;
use crate::progress::ProgressFn;

/// Capability interface implemented by every embedding backend.
///
/// A session embeds one corpus: the destination matrix moves into the
/// provider at [`begin_session`](Self::begin_session), batches are
/// submitted with their destination row offsets, and
/// [`end_session`](Self::end_session) blocks until every submitted
/// batch has been applied, returning the filled matrix.
///
/// Implementations may fill destination rows synchronously on submit
/// (a local backend) or pipeline asynchronously against a remote
/// service; callers cannot tell the difference. A provider handles one
/// session at a time: embedding two corpora through one shared
/// provider requires finishing the first session before starting the
/// second.
pub trait EmbeddingProvider {
    /// Dimension of the vectors this backend produces. Known from
    /// initialization onward, before any session starts.
    fn embedding_dim(&self) -> usize;

    /// Starts a session that will receive exactly `expected_batches`
    /// submissions, taking ownership of the destination matrix.
    /// `progress` is invoked as `(completed_batches, expected_batches)`
    /// each time a batch has been fully applied.
    fn begin_session(
        &mut self,
        destination: EmbeddingMatrix,
        expected_batches: usize,
        progress: ProgressFn,
    ) -> Result<(), EmbeddingError>;

    /// Submits one batch of tokenized sentences. The destination view
    /// is the `sum(sentence lengths)` rows starting at `row_offset`;
    /// rows are filled with unit-normalized vectors in original token
    /// order.
    fn submit_batch(
        &mut self,
        sentences: &[Vec<&str>],
        row_offset: usize,
    ) -> Result<(), EmbeddingError>;

    /// Blocks until every submitted batch of the current session has
    /// been applied and returns the filled matrix.
    fn end_session(&mut self) -> Result<EmbeddingMatrix, EmbeddingError>;
}

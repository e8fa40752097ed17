//! Production configuration constants.
//!
//! Constants that define the production configuration for tagmatch.
//! Runtime knobs (service endpoints, similarity threshold, frame budgets)
//! live on the client and engine structs; everything here is a fixed
//! property of the pipeline that tests and benchmarks rely on.

/// Number of sentences submitted per embedding request.
///
/// Batches are sized in sentences, not tokens, so the per-request
/// payload varies with sentence length. 64 keeps individual responses
/// small enough to bound the receive buffer while leaving enough
/// requests in flight to hide network round-trip latency.
pub const SENTENCE_BATCH: usize = 64;

/// Initial value of every confusion-matrix cell.
///
/// Downstream metrics take logarithms of cell values; seeding each cell
/// with a tiny epsilon avoids zero-division without measurably biasing
/// the counts.
pub const CONFUSION_EPSILON: f64 = 1e-10;

/// Default cosine-similarity threshold for accepting a nearest-neighbor
/// match. Tokens whose best match falls at or below this are counted as
/// unmatched rather than contributing a confusion cell.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Special-token rows surrounding each sentence in a per-token response.
///
/// When the server reports no fixed sequence length, responses are sized
/// to the longest sentence in the batch plus one leading and one
/// trailing special-token position. This is asserted against the
/// response shape, not negotiated.
pub const SPECIAL_TOKEN_POSITIONS: usize = 2;

/// Default upper bound on a single inbound frame part, in bytes.
///
/// The receive buffer is reused across responses, so this is the peak
/// inbound allocation for a session. A full 64-sentence batch of
/// 512-position, 1024-dimensional float32 vectors is ~134 MB; the
/// default leaves headroom above that. Configurable per client.
pub const DEFAULT_MAX_PART_BYTES: usize = 256 * 1024 * 1024;

/// Maximum parts accepted in one inbound frame. Protocol messages carry
/// at most four parts; anything larger is malformed.
pub const MAX_FRAME_PARTS: usize = 4;

/// Rows per block for the accelerated matmul matching backend.
pub const ACCEL_BLOCK_ROWS: usize = 2048;

/// Tokens processed per unit of matching progress in the fallback path.
pub const MATCH_PROGRESS_CHUNK: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsilon_is_positive_and_tiny() {
        assert!(CONFUSION_EPSILON > 0.0);
        assert!(CONFUSION_EPSILON < 1e-6);
    }

    #[test]
    fn test_default_frame_budget_covers_full_batch() {
        // 64 sentences x 512 positions x 1024 dims x 4 bytes
        let worst_case = SENTENCE_BATCH * 512 * 1024 * 4;
        assert!(DEFAULT_MAX_PART_BYTES > worst_case);
    }
}

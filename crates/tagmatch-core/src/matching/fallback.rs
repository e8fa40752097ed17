//! Parallel brute-force matching backend.
//!
//! Partitions the outer token loop across the rayon worker pool; each
//! worker scans the entire other matrix for its tokens' argmax dot
//! product and accumulates into the shared confusion cells atomically.
//! Contention on individual cells is rare relative to the matrix sizes,
//! and `+=` commutes, so accumulation order never changes the result.

use super::confusion::DirectionAccumulator;
use crate::config::MATCH_PROGRESS_CHUNK;
use crate::embedding::EmbeddingMatrix;
use crate::progress::ProgressTracker;
use rayon::prelude::*;

/// Matches every `from` token against all of `to`, recording each
/// above-threshold pair into `acc` and advancing `tracker` per token.
pub(crate) fn match_direction(
    from: &EmbeddingMatrix,
    from_labels: &[u8],
    to: &EmbeddingMatrix,
    to_labels: &[u8],
    threshold: f32,
    acc: &DirectionAccumulator,
    tracker: &ProgressTracker,
) {
    if to.rows() == 0 {
        // Nothing to match against; every token is unmatched.
        for _ in 0..from.rows() {
            acc.record_unmatched();
        }
        tracker.advance(from.rows());
        return;
    }

    let indices: Vec<usize> = (0..from.rows()).collect();
    indices.par_chunks(MATCH_PROGRESS_CHUNK).for_each(|chunk| {
        for &i in chunk {
            let (best, similarity) = argmax_dot(from.row(i), to);
            if similarity > threshold {
                acc.record(from_labels[i], to_labels[best], similarity);
            } else {
                acc.record_unmatched();
            }
        }
        tracker.advance(chunk.len());
    });
}

/// Index and similarity of the `to` row with maximum dot product
/// against `query`. Ties resolve to the first index, so a given input
/// always produces the same match.
fn argmax_dot(query: &[f32], to: &EmbeddingMatrix) -> (usize, f32) {
    let mut best = 0;
    let mut best_sim = f32::NEG_INFINITY;
    for j in 0..to.rows() {
        let sim = dot(query, to.row(j));
        if sim > best_sim {
            best_sim = sim;
            best = j;
        }
    }
    (best, best_sim)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_matrix(rows: &[[f32; 2]]) -> EmbeddingMatrix {
        let mut data = Vec::new();
        for row in rows {
            let norm = (row[0] * row[0] + row[1] * row[1]).sqrt();
            data.push(row[0] / norm);
            data.push(row[1] / norm);
        }
        EmbeddingMatrix::from_rows(rows.len(), 2, data)
    }

    #[test]
    fn test_argmax_picks_most_similar() {
        let to = unit_matrix(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let (best, sim) = argmax_dot(&[0.0, 1.0], &to);
        assert_eq!(best, 1);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_tie_breaks_to_first() {
        let to = unit_matrix(&[[1.0, 0.0], [1.0, 0.0]]);
        let (best, _) = argmax_dot(&[1.0, 0.0], &to);
        assert_eq!(best, 0);
    }

    #[test]
    fn test_direction_counts_matched_and_unmatched() {
        let from = unit_matrix(&[[1.0, 0.0], [0.0, 1.0]]);
        let to = unit_matrix(&[[1.0, 0.0]]);
        let acc = DirectionAccumulator::new(2, 1);
        let tracker = ProgressTracker::new(2);

        // Token 0 matches to[0] with sim 1.0; token 1 is orthogonal.
        match_direction(&from, &[0, 1], &to, &[0], 0.5, &acc, &tracker);

        let pair = acc.freeze();
        assert!((pair.counts.get(0, 0) - 1.0).abs() < 1e-9);
        assert!(pair.counts.get(1, 0) < 1.0);
        assert_eq!(acc.unmatched(), 1);
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_empty_to_matrix_all_unmatched() {
        let from = unit_matrix(&[[1.0, 0.0], [0.0, 1.0]]);
        let to = EmbeddingMatrix::zeroed(0, 2);
        let acc = DirectionAccumulator::new(2, 1);
        let tracker = ProgressTracker::new(2);
        match_direction(&from, &[0, 1], &to, &[], 0.5, &acc, &tracker);
        assert_eq!(acc.unmatched(), 2);
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let from = unit_matrix(&[[1.0, 0.0], [0.3, 0.7], [0.0, 1.0]]);
        let to = unit_matrix(&[[0.9, 0.1], [0.1, 0.9]]);
        let labels_from = [0u8, 1, 1];
        let labels_to = [0u8, 1];

        let run = || {
            let acc = DirectionAccumulator::new(2, 2);
            let tracker = ProgressTracker::new(3);
            match_direction(&from, &labels_from, &to, &labels_to, 0.2, &acc, &tracker);
            (acc.freeze(), acc.unmatched())
        };
        let (first, unmatched_first) = run();
        let (second, unmatched_second) = run();

        assert_eq!(unmatched_first, unmatched_second);
        assert_eq!(first.counts.cells(), second.counts.cells());
        for (a, b) in first
            .weighted
            .cells()
            .iter()
            .zip(second.weighted.cells().iter())
        {
            assert!((a - b).abs() < 1e-9);
        }
    }
}

//! Label-confusion matrices and their shared atomic accumulator.

use crate::config::CONFUSION_EPSILON;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Dense `rows x cols` matrix of f64 cells, seeded with the epsilon
/// floor so downstream log-based metrics never divide by zero.
#[derive(Clone, Debug, Serialize)]
pub struct ConfusionMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<f64>,
}

impl ConfusionMatrix {
    /// Cell value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cells[row * self.cols + col]
    }

    /// Number of rows (labels of the "from" corpus).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (labels of the "to" corpus).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Sum over all cells, including the epsilon floor.
    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// Row-major cell slice.
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }
}

/// Unweighted count matrix plus similarity-weighted sum matrix for one
/// matching direction.
#[derive(Clone, Debug, Serialize)]
pub struct ConfusionPair {
    /// How often each label pair was nearest-neighbor matched.
    pub counts: ConfusionMatrix,
    /// Same cells, each increment weighted by the match similarity.
    pub weighted: ConfusionMatrix,
}

/// Shared accumulator the matching backends write into.
///
/// Cells are f64 bit patterns in `AtomicU64`s, updated with CAS add
/// loops so concurrent workers never take a matrix-wide lock.
/// Accumulation order does not affect the sums beyond floating-point
/// rounding, so results are reproducible per backend.
pub(crate) struct DirectionAccumulator {
    rows: usize,
    cols: usize,
    counts: Vec<AtomicU64>,
    weighted: Vec<AtomicU64>,
    unmatched: AtomicU64,
}

impl DirectionAccumulator {
    pub(crate) fn new(rows: usize, cols: usize) -> Self {
        let acc = Self {
            rows,
            cols,
            counts: (0..rows * cols).map(|_| AtomicU64::new(0)).collect(),
            weighted: (0..rows * cols).map(|_| AtomicU64::new(0)).collect(),
            unmatched: AtomicU64::new(0),
        };
        acc.reset();
        acc
    }

    /// Records one above-threshold match of `from_label` onto `to_label`.
    pub(crate) fn record(&self, from_label: u8, to_label: u8, similarity: f32) {
        let idx = from_label as usize * self.cols + to_label as usize;
        atomic_add_f64(&self.counts[idx], 1.0);
        atomic_add_f64(&self.weighted[idx], f64::from(similarity));
    }

    /// Records one token whose best match fell below the threshold.
    pub(crate) fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Restores every cell to the epsilon floor and clears the
    /// unmatched counter, discarding any partial results.
    pub(crate) fn reset(&self) {
        for cell in &self.counts {
            cell.store(CONFUSION_EPSILON.to_bits(), Ordering::Relaxed);
        }
        for cell in &self.weighted {
            cell.store(CONFUSION_EPSILON.to_bits(), Ordering::Relaxed);
        }
        self.unmatched.store(0, Ordering::Relaxed);
    }

    pub(crate) fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }

    /// Snapshots the accumulator into plain matrices.
    pub(crate) fn freeze(&self) -> ConfusionPair {
        let load = |cells: &[AtomicU64]| ConfusionMatrix {
            rows: self.rows,
            cols: self.cols,
            cells: cells
                .iter()
                .map(|c| f64::from_bits(c.load(Ordering::Relaxed)))
                .collect(),
        };
        ConfusionPair {
            counts: load(&self.counts),
            weighted: load(&self.weighted),
        }
    }
}

/// Lock-free `+=` on an f64 stored as bits.
fn atomic_add_f64(cell: &AtomicU64, value: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(current) + value).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_start_at_epsilon() {
        let acc = DirectionAccumulator::new(2, 3);
        let pair = acc.freeze();
        assert_eq!(pair.counts.rows(), 2);
        assert_eq!(pair.counts.cols(), 3);
        for row in 0..2 {
            for col in 0..3 {
                assert_eq!(pair.counts.get(row, col), CONFUSION_EPSILON);
                assert_eq!(pair.weighted.get(row, col), CONFUSION_EPSILON);
            }
        }
        assert_eq!(acc.unmatched(), 0);
    }

    #[test]
    fn test_record_accumulates_count_and_weight() {
        let acc = DirectionAccumulator::new(2, 2);
        acc.record(0, 1, 0.9);
        acc.record(0, 1, 0.8);
        acc.record_unmatched();
        let pair = acc.freeze();
        assert!((pair.counts.get(0, 1) - 2.0).abs() < 1e-9);
        assert!((pair.weighted.get(0, 1) - 1.7).abs() < 1e-6);
        assert_eq!(acc.unmatched(), 1);
    }

    #[test]
    fn test_reset_discards_partial_results() {
        let acc = DirectionAccumulator::new(1, 1);
        acc.record(0, 0, 0.5);
        acc.record_unmatched();
        acc.reset();
        let pair = acc.freeze();
        assert_eq!(pair.counts.get(0, 0), CONFUSION_EPSILON);
        assert_eq!(acc.unmatched(), 0);
    }

    #[test]
    fn test_concurrent_adds_commute() {
        use std::sync::Arc;
        let acc = Arc::new(DirectionAccumulator::new(1, 1));
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let acc = Arc::clone(&acc);
                scope.spawn(move || {
                    for _ in 0..1000 {
                        acc.record(0, 0, 0.5);
                    }
                });
            }
        });
        let pair = acc.freeze();
        assert!((pair.counts.get(0, 0) - 4000.0).abs() < 1e-6);
        assert!((pair.weighted.get(0, 0) - 2000.0).abs() < 1e-6);
    }
}

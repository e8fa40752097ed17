//! The matching engine: backend dispatch and confusion accumulation.

use super::accelerated::AcceleratedBackend;
use super::confusion::{ConfusionPair, DirectionAccumulator};
use super::fallback;
use crate::config::DEFAULT_SIMILARITY_THRESHOLD;
use crate::corpus::Corpus;
use crate::embedding::EmbeddingMatrix;
use crate::error::MatchError;
use crate::progress::{ProgressFn, ProgressTracker};
use tracing::{debug, warn};

/// Result of comparing two embedded corpora: confusion matrices for
/// both matching directions plus the below-threshold token counts.
#[derive(Clone, Debug, serde::Serialize)]
pub struct MatchOutcome {
    /// A-token → nearest B-token confusion (rows = A labels).
    pub a_to_b: ConfusionPair,
    /// B-token → nearest A-token confusion (rows = B labels).
    pub b_to_a: ConfusionPair,
    /// A tokens whose best match fell at or below the threshold.
    pub unmatched_a: u64,
    /// B tokens whose best match fell at or below the threshold.
    pub unmatched_b: u64,
}

/// Brute-force bidirectional nearest-neighbor matcher.
///
/// Construction probes for an accelerated device once; the chosen
/// backend then serves every comparison. An accelerated run that fails
/// or reports incomplete progress is discarded wholesale (matrices and
/// counters reset) and redone via the parallel fallback, so partial
/// accelerated results never mix with fallback results.
pub struct MatchingEngine {
    threshold: f32,
    backend: Option<AcceleratedBackend>,
}

impl MatchingEngine {
    /// Creates an engine with the given similarity threshold, probing
    /// for an accelerated device.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            backend: AcceleratedBackend::try_new(),
        }
    }

    /// Creates an engine that always uses the parallel fallback.
    pub fn fallback_only(threshold: f32) -> Self {
        Self {
            threshold,
            backend: None,
        }
    }

    /// The configured similarity threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Compares two embedded corpora, producing confusion matrices in
    /// both directions.
    pub fn compare(&self, a: &Corpus, b: &Corpus) -> Result<MatchOutcome, MatchError> {
        self.compare_with_progress(a, b, crate::progress::silent())
    }

    /// Like [`compare`](Self::compare), reporting matched-token
    /// progress as `(completed, total)` over both directions.
    pub fn compare_with_progress(
        &self,
        a: &Corpus,
        b: &Corpus,
        progress: ProgressFn,
    ) -> Result<MatchOutcome, MatchError> {
        let mat_a = a
            .embeddings()
            .ok_or_else(|| MatchError::NotEmbedded(a.name().to_string()))?;
        let mat_b = b
            .embeddings()
            .ok_or_else(|| MatchError::NotEmbedded(b.name().to_string()))?;
        if mat_a.dim() != mat_b.dim() {
            return Err(MatchError::DimensionMismatch(mat_a.dim(), mat_b.dim()));
        }

        let acc_ab = DirectionAccumulator::new(a.label_count(), b.label_count());
        let acc_ba = DirectionAccumulator::new(b.label_count(), a.label_count());
        let total = mat_a.rows() + mat_b.rows();
        let tracker = ProgressTracker::with_callback(total, progress);

        let mut accelerated_done = false;
        if let Some(backend) = &self.backend {
            match self.run_accelerated(backend, mat_a, a.labels(), mat_b, b.labels(), &acc_ab, &acc_ba, &tracker)
            {
                Ok(()) if tracker.is_complete() => accelerated_done = true,
                Ok(()) => {
                    warn!("accelerated matching finished with incomplete progress, rerunning via fallback");
                }
                Err(err) => {
                    warn!(error = %err, "accelerated matching failed, rerunning via fallback");
                }
            }
            if !accelerated_done {
                // Partial accelerated results are never merged.
                acc_ab.reset();
                acc_ba.reset();
                tracker.reset();
            }
        }

        if !accelerated_done {
            debug!(
                tokens_a = mat_a.rows(),
                tokens_b = mat_b.rows(),
                "matching via parallel fallback"
            );
            fallback::match_direction(
                mat_a,
                a.labels(),
                mat_b,
                b.labels(),
                self.threshold,
                &acc_ab,
                &tracker,
            );
            fallback::match_direction(
                mat_b,
                b.labels(),
                mat_a,
                a.labels(),
                self.threshold,
                &acc_ba,
                &tracker,
            );
        }

        Ok(MatchOutcome {
            a_to_b: acc_ab.freeze(),
            b_to_a: acc_ba.freeze(),
            unmatched_a: acc_ab.unmatched(),
            unmatched_b: acc_ba.unmatched(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_accelerated(
        &self,
        backend: &AcceleratedBackend,
        mat_a: &EmbeddingMatrix,
        labels_a: &[u8],
        mat_b: &EmbeddingMatrix,
        labels_b: &[u8],
        acc_ab: &DirectionAccumulator,
        acc_ba: &DirectionAccumulator,
        tracker: &ProgressTracker,
    ) -> Result<(), candle_core::Error> {
        let threshold = self.threshold;
        backend.match_direction(mat_a, mat_b, |start, sims, args| {
            for (i, (&sim, &arg)) in sims.iter().zip(args.iter()).enumerate() {
                if sim > threshold {
                    acc_ab.record(labels_a[start + i], labels_b[arg as usize], sim);
                } else {
                    acc_ab.record_unmatched();
                }
            }
            tracker.advance(sims.len());
        })?;
        backend.match_direction(mat_b, mat_a, |start, sims, args| {
            for (i, (&sim, &arg)) in sims.iter().zip(args.iter()).enumerate() {
                if sim > threshold {
                    acc_ba.record(labels_b[start + i], labels_a[arg as usize], sim);
                } else {
                    acc_ba.record_unmatched();
                }
            }
            tracker.advance(sims.len());
        })?;
        // Empty inputs produce no callbacks; account for them so the
        // completeness check doesn't force a pointless fallback rerun.
        if mat_a.rows() == 0 || mat_b.rows() == 0 {
            for _ in 0..mat_a.rows() {
                acc_ab.record_unmatched();
            }
            for _ in 0..mat_b.rows() {
                acc_ba.record_unmatched();
            }
            tracker.advance(mat_a.rows() + mat_b.rows());
        }
        Ok(())
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Corpus, TaggedSentence, VecSource};
    use crate::embedding::{EmbeddingMatrix, EmbeddingProvider};
    use crate::error::EmbeddingError;
    use crate::progress::ProgressFn;
    use std::collections::HashMap;

    /// Synchronous provider that looks tokens up in a fixed vector
    /// table, mirroring a local static-vector backend.
    struct TableProvider {
        dim: usize,
        table: HashMap<String, Vec<f32>>,
        session: Option<EmbeddingMatrix>,
    }

    impl TableProvider {
        fn new(dim: usize, entries: &[(&str, &[f32])]) -> Self {
            Self {
                dim,
                table: entries
                    .iter()
                    .map(|(w, v)| (w.to_string(), v.to_vec()))
                    .collect(),
                session: None,
            }
        }
    }

    impl EmbeddingProvider for TableProvider {
        fn embedding_dim(&self) -> usize {
            self.dim
        }

        fn begin_session(
            &mut self,
            destination: EmbeddingMatrix,
            _expected_batches: usize,
            _progress: ProgressFn,
        ) -> Result<(), EmbeddingError> {
            self.session = Some(destination);
            Ok(())
        }

        fn submit_batch(
            &mut self,
            sentences: &[Vec<&str>],
            row_offset: usize,
        ) -> Result<(), EmbeddingError> {
            let matrix = self.session.as_mut().ok_or(EmbeddingError::NoSession)?;
            let mut row = row_offset;
            for sentence in sentences {
                for token in sentence {
                    let vector = &self.table[*token];
                    matrix.row_mut(row).copy_from_slice(vector);
                    crate::embedding::l2_normalize(matrix.row_mut(row));
                    row += 1;
                }
            }
            Ok(())
        }

        fn end_session(&mut self) -> Result<EmbeddingMatrix, EmbeddingError> {
            self.session.take().ok_or(EmbeddingError::NoSession)
        }
    }

    fn build_corpus(name: &str, words: &[(&str, &str)], provider: &mut TableProvider) -> Corpus {
        let mut corpus = Corpus::new(name);
        let mut source = VecSource::new(vec![TaggedSentence::new(words.iter().copied())]);
        corpus.read(&mut source).unwrap();
        corpus.end_reading(provider.embedding_dim()).unwrap();
        corpus
            .embed(provider, crate::progress::silent())
            .unwrap();
        corpus
    }

    /// Vectors chosen so cat≈dog (sim ~0.95) and sat≈ran (sim ~0.9).
    fn scenario_provider() -> TableProvider {
        TableProvider::new(
            2,
            &[
                ("cat", [1.0, 0.0].as_slice()),
                ("dog", [0.95, 0.312_25].as_slice()),
                ("sat", [0.0, 1.0].as_slice()),
                ("ran", [0.435_89, 0.9].as_slice()),
            ],
        )
    }

    #[test]
    fn test_scenario_diagonal_confusion() {
        let mut provider = scenario_provider();
        let a = build_corpus("a", &[("cat", "NOUN"), ("sat", "VERB")], &mut provider);
        let b = build_corpus("b", &[("dog", "NOUN"), ("ran", "VERB")], &mut provider);

        let engine = MatchingEngine::fallback_only(0.5);
        let outcome = engine.compare(&a, &b).unwrap();

        // NOUN/NOUN and VERB/VERB each matched once, both directions.
        assert!((outcome.a_to_b.counts.get(0, 0) - 1.0).abs() < 1e-9);
        assert!((outcome.a_to_b.counts.get(1, 1) - 1.0).abs() < 1e-9);
        assert!((outcome.b_to_a.counts.get(0, 0) - 1.0).abs() < 1e-9);
        assert!((outcome.b_to_a.counts.get(1, 1) - 1.0).abs() < 1e-9);
        assert!(outcome.a_to_b.counts.get(0, 1) < 1.0);
        assert_eq!(outcome.unmatched_a, 0);
        assert_eq!(outcome.unmatched_b, 0);

        // Weighted cells carry the similarities.
        assert!(outcome.a_to_b.weighted.get(0, 0) > 0.9);
        assert!(outcome.a_to_b.weighted.get(1, 1) > 0.85);
    }

    #[test]
    fn test_threshold_above_all_leaves_epsilon_floor() {
        let mut provider = scenario_provider();
        let a = build_corpus("a", &[("cat", "NOUN"), ("sat", "VERB")], &mut provider);
        let b = build_corpus("b", &[("dog", "NOUN"), ("ran", "VERB")], &mut provider);

        let engine = MatchingEngine::fallback_only(0.99);
        let outcome = engine.compare(&a, &b).unwrap();

        assert_eq!(outcome.unmatched_a, 2);
        assert_eq!(outcome.unmatched_b, 2);
        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(
                    outcome.a_to_b.counts.get(row, col),
                    crate::config::CONFUSION_EPSILON
                );
            }
        }
    }

    #[test]
    fn test_matched_total_equals_matched_tokens() {
        let mut provider = scenario_provider();
        let a = build_corpus("a", &[("cat", "NOUN"), ("sat", "VERB")], &mut provider);
        let b = build_corpus("b", &[("dog", "NOUN"), ("ran", "VERB")], &mut provider);

        let engine = MatchingEngine::fallback_only(0.5);
        let outcome = engine.compare(&a, &b).unwrap();

        let matched_a = a.token_count() as u64 - outcome.unmatched_a;
        let floor = 4.0 * crate::config::CONFUSION_EPSILON;
        assert!((outcome.a_to_b.counts.total() - floor - matched_a as f64).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut provider2 = scenario_provider();
        let mut provider3 = TableProvider::new(3, &[("cat", [1.0, 0.0, 0.0].as_slice())]);
        let a = build_corpus("a", &[("cat", "NOUN")], &mut provider2);
        let b = build_corpus("b", &[("cat", "NOUN")], &mut provider3);

        let engine = MatchingEngine::fallback_only(0.5);
        assert!(matches!(
            engine.compare(&a, &b),
            Err(MatchError::DimensionMismatch(2, 3))
        ));
    }

    #[test]
    fn test_compare_is_idempotent() {
        let mut provider = scenario_provider();
        let a = build_corpus(
            "a",
            &[("cat", "NOUN"), ("sat", "VERB"), ("dog", "NOUN")],
            &mut provider,
        );
        let b = build_corpus("b", &[("dog", "NOUN"), ("ran", "VERB")], &mut provider);

        let engine = MatchingEngine::fallback_only(0.3);
        let first = engine.compare(&a, &b).unwrap();
        let second = engine.compare(&a, &b).unwrap();
        assert_eq!(first.unmatched_a, second.unmatched_a);
        assert_eq!(first.a_to_b.counts.cells(), second.a_to_b.counts.cells());
    }
}

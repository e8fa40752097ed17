//! Bidirectional nearest-neighbor matching between two embedded corpora.
//!
//! For every token in corpus A the engine finds the most similar token
//! in corpus B (and vice versa) by maximum dot product over the
//! pre-normalized embedding matrices, accumulating label-confusion
//! matrices in both directions. Two execution backends exist: a blocked
//! matrix-multiply path on accelerated devices and a rayon brute-force
//! fallback; a failed or incomplete accelerated run is discarded
//! entirely and redone via the fallback.

mod accelerated;
mod confusion;
mod engine;
mod fallback;

pub use confusion::{ConfusionMatrix, ConfusionPair};
pub use engine::{MatchOutcome, MatchingEngine};

//! Rendering of comparison reports.

use anyhow::Result;
use std::fmt::Write;
use tagmatch_core::compare::ComparisonReport;
use tagmatch_core::matching::ConfusionPair;

/// Serializes the full report as pretty-printed JSON.
pub fn format_json(report: &ComparisonReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Renders a human-readable summary with both confusion matrices.
pub fn format_human(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Compared {} tokens (A) against {} tokens (B)",
        report.tokens_a, report.tokens_b
    );
    let _ = writeln!(
        out,
        "Timing: read {}ms, embed {}ms, match {}ms",
        report.read_ms, report.embed_ms, report.match_ms
    );
    let _ = writeln!(
        out,
        "Unmatched: {} (A->B), {} (B->A)\n",
        report.outcome.unmatched_a, report.outcome.unmatched_b
    );

    let _ = writeln!(out, "A->B match counts:");
    render_matrix(
        &mut out,
        &report.outcome.a_to_b,
        &report.labels_a,
        &report.labels_b,
    );
    let _ = writeln!(out, "\nB->A match counts:");
    render_matrix(
        &mut out,
        &report.outcome.b_to_a,
        &report.labels_b,
        &report.labels_a,
    );
    out
}

fn render_matrix(out: &mut String, pair: &ConfusionPair, rows: &[String], cols: &[String]) {
    let width = rows
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(4)
        .max(4);
    let _ = write!(out, "{:width$}", "");
    for col in cols {
        let _ = write!(out, " {col:>8}");
    }
    let _ = writeln!(out);
    for (i, row) in rows.iter().enumerate() {
        let _ = write!(out, "{row:width$}");
        for j in 0..cols.len() {
            // Cells hold count + epsilon floor; render as integers.
            let _ = write!(out, " {:>8.0}", pair.counts.get(i, j).floor());
        }
        let _ = writeln!(out);
    }
}

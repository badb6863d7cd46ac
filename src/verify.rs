//! Turns one client's per-server score matrices into correct/fail tallies.

use itertools::iproduct;
use tracing::warn;

use crate::metrics::{Direction, Metric, ScoreMatrix};
use crate::results::ResultTable;

/// Index of the best score; the first server reaching the extremum wins ties.
pub fn select_guess(direction: Direction, scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        let better = match (best, direction) {
            (None, _) => true,
            (Some((_, b)), Direction::LowerIsBetter) => score < b,
            (Some((_, b)), Direction::HigherIsBetter) => score > b,
        };
        if better {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Record one guess per (metric, feature) cell for a single client.
///
/// `per_server[s]` holds the scores of the client against server `s`, rows in
/// the order of `metrics`. A cell whose guess cannot be resolved is left as is.
pub fn verify_guesses(
    table: &mut ResultTable,
    per_server: &[ScoreMatrix],
    metrics: &[Metric],
    n_features: usize,
    target: usize,
) {
    for ((m, metric), feature) in iproduct!(metrics.iter().enumerate(), 0..n_features) {
        let attempts: Option<Vec<f64>> = per_server.iter().map(|s| s.get(m, feature)).collect();
        let guess = attempts.and_then(|a| select_guess(metric.direction(), &a));

        let Some(guess) = guess else {
            warn!(metric = metric.name(), feature, "could not resolve a guess");
            continue;
        };
        match table.cell_mut(m, feature) {
            Some(cell) => cell.record(guess == target),
            None => warn!(metric = metric.name(), feature, "no result cell"),
        }
    }
}

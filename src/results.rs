//! Correct/fail tallies per (metric, feature) cell.

use serde::Serialize;

/// Correct and wrong guesses of one (metric, feature) cell within a repetition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GuessTally {
    pub corrects: u64,
    pub fails: u64,
}

impl GuessTally {
    pub fn record(&mut self, correct: bool) {
        if correct {
            self.corrects += 1;
        } else {
            self.fails += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.corrects + self.fails
    }

    /// `corrects / (corrects + fails)`, 0 when nothing was guessed.
    pub fn relative_success(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.corrects as f64 / total as f64,
        }
    }
}

/// Metrics x features grid of tallies for one repetition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultTable {
    cells: Vec<Vec<GuessTally>>,
}

impl ResultTable {
    pub fn new(n_metrics: usize, n_features: usize) -> Self {
        Self { cells: vec![vec![GuessTally::default(); n_features]; n_metrics] }
    }

    pub fn n_metrics(&self) -> usize {
        self.cells.len()
    }

    pub fn n_features(&self) -> usize {
        self.cells.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn cell(&self, metric: usize, feature: usize) -> Option<&GuessTally> {
        self.cells.get(metric).and_then(|r| r.get(feature))
    }

    pub fn cell_mut(&mut self, metric: usize, feature: usize) -> Option<&mut GuessTally> {
        self.cells.get_mut(metric).and_then(|r| r.get_mut(feature))
    }
}

/// Completed tables, one per repetition that had data. Tables cannot be
/// modified once pushed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepetitionCollection {
    tables: Vec<ResultTable>,
}

impl RepetitionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table: ResultTable) {
        self.tables.push(table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultTable> {
        self.tables.iter()
    }

    fn cells(&self, metric: usize, feature: usize) -> impl Iterator<Item = &GuessTally> {
        self.tables.iter().filter_map(move |t| t.cell(metric, feature))
    }

    /// Per-repetition success rate of one cell.
    pub fn relative_success(&self, metric: usize, feature: usize) -> Vec<f64> {
        self.cells(metric, feature).map(GuessTally::relative_success).collect()
    }

    pub fn total_corrects(&self, metric: usize, feature: usize) -> u64 {
        self.cells(metric, feature).map(|c| c.corrects).sum()
    }

    pub fn total_fails(&self, metric: usize, feature: usize) -> u64 {
        self.cells(metric, feature).map(|c| c.fails).sum()
    }
}

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::Rng;

use traffic_confirmation::data::source::{ResultSink, TraceSource};
use traffic_confirmation::error::{AnalysisError, Result};
use traffic_confirmation::metrics::Feature;
use traffic_confirmation::setup::SetupRecord;
use traffic_confirmation::stats::StatisticsRow;

/// Captured rows, all five features per row in `Feature::ALL` order.
pub type Rows = Vec<[f64; 5]>;

#[derive(Default)]
pub struct MemorySource {
    pub setups: HashMap<i64, SetupRecord>,
    pub traces: HashMap<(i64, u32, i64), Rows>,
    pub broken_setup_count: bool,
}

impl MemorySource {
    pub fn setup(mut self, id: i64, topology: &str, num_clients: u32, repetitions: u32) -> Self {
        self.setups.insert(
            id,
            SetupRecord { topology: topology.to_string(), num_clients, repetitions },
        );
        self
    }

    pub fn trace(mut self, setup_id: i64, repetition: u32, node_id: i64, rows: Rows) -> Self {
        self.traces.insert((setup_id, repetition, node_id), rows);
        self
    }

    fn select(rows: &Rows, features: &[Feature]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                features
                    .iter()
                    .map(|f| row[Feature::ALL.iter().position(|a| a == f).unwrap_or(0)])
                    .collect()
            })
            .collect()
    }
}

impl TraceSource for MemorySource {
    async fn setup_count(&self) -> Result<i64> {
        if self.broken_setup_count {
            return Err(AnalysisError::LockPoisoned);
        }
        Ok(self.setups.len() as i64)
    }

    async fn setup_record(&self, setup_id: i64) -> Result<SetupRecord> {
        self.setups.get(&setup_id).cloned().ok_or(AnalysisError::SetupNotFound(setup_id))
    }

    async fn repetition_exists(&self, setup_id: i64, repetition: u32) -> Result<bool> {
        Ok(self.traces.keys().any(|&(s, r, _)| s == setup_id && r == repetition))
    }

    async fn node_trace(&self, setup_id: i64, repetition: u32, node_id: i64, features: &[Feature]) -> Result<Vec<Vec<f64>>> {
        Ok(self
            .traces
            .get(&(setup_id, repetition, node_id))
            .map(|rows| Self::select(rows, features))
            .unwrap_or_default())
    }

    async fn node_set_traces(
        &self,
        setup_id: i64,
        repetition: u32,
        node_ids: &[i64],
        features: &[Feature],
    ) -> Result<Vec<(i64, Vec<f64>)>> {
        let mut out = Vec::new();
        for &node_id in node_ids {
            if let Some(rows) = self.traces.get(&(setup_id, repetition, node_id)) {
                out.extend(Self::select(rows, features).into_iter().map(|r| (node_id, r)));
            }
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub rows: RefCell<Vec<StatisticsRow>>,
    /// Reject every n-th write (1-based) when set.
    pub fail_every: Option<usize>,
    attempts: RefCell<usize>,
}

impl MemorySink {
    pub fn failing_every(n: usize) -> Self {
        Self { fail_every: Some(n), ..Default::default() }
    }
}

impl ResultSink for MemorySink {
    async fn write_row(&self, row: &StatisticsRow) -> Result<()> {
        let attempt = {
            let mut a = self.attempts.borrow_mut();
            *a += 1;
            *a
        };
        if matches!(self.fail_every, Some(n) if attempt % n == 0) {
            return Err(AnalysisError::LockPoisoned);
        }
        self.rows.borrow_mut().push(row.clone());
        Ok(())
    }
}

/// Random packet features in realistic ranges.
pub fn random_rows(rng: &mut StdRng, len: usize) -> Rows {
    (0..len)
        .map(|_| {
            [
                rng.gen_range(1..4) as f64,
                rng.gen_range(0.0..0.2),
                rng.gen_range(40..1500) as f64,
                rng.gen_range(32..128) as f64,
                rng.gen_range(512..65535) as f64,
            ]
        })
        .collect()
}

/// Same value in every feature column.
pub fn uniform_rows(values: &[f64]) -> Rows {
    values.iter().map(|&v| [v; 5]).collect()
}

//! Contracts the pipeline consumes from whatever store holds the captures.
//!
//! Every method is an independent future. The pipeline awaits each one before
//! issuing the next, so implementations never see overlapping calls.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::metrics::Feature;
use crate::setup::SetupRecord;
use crate::stats::StatisticsRow;

pub trait TraceSource {
    /// Number of setups available; "all setups" covers ids `1..=count`.
    async fn setup_count(&self) -> Result<i64>;

    async fn setup_record(&self, setup_id: i64) -> Result<SetupRecord>;

    async fn repetition_exists(&self, setup_id: i64, repetition: u32) -> Result<bool>;

    /// Rows of one node, values in the order of `features`. Empty means missing data.
    async fn node_trace(
        &self,
        setup_id: i64,
        repetition: u32,
        node_id: i64,
        features: &[Feature],
    ) -> Result<Vec<Vec<f64>>>;

    /// Rows of several nodes at once, each prefixed with its node id.
    async fn node_set_traces(
        &self,
        setup_id: i64,
        repetition: u32,
        node_ids: &[i64],
        features: &[Feature],
    ) -> Result<Vec<(i64, Vec<f64>)>>;
}

/// Append-only destination for aggregated statistics.
pub trait ResultSink {
    async fn write_row(&self, row: &StatisticsRow) -> Result<()>;
}

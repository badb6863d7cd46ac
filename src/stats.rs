//! Reduce a setup's repetitions into success-rate statistics and persist them.

use itertools::iproduct;
use serde::Serialize;
use tracing::{error, info};

use crate::data::source::ResultSink;
use crate::metrics::{Feature, Metric};
use crate::results::RepetitionCollection;

/// One persisted statistics row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatisticsRow {
    pub setup_id: i64,
    pub metric: Metric,
    pub feature: Feature,
    pub success_avg: f64,
    pub success_sd: f64,
    pub num_successes: u64,
    pub num_fails: u64,
}

/// Mean and population standard deviation; `(0, 0)` for no values.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// One row per (metric, feature), in metric-major order.
pub fn aggregate(
    setup_id: i64,
    repetitions: &RepetitionCollection,
    metrics: &[Metric],
    features: &[Feature],
) -> Vec<StatisticsRow> {
    iproduct!(metrics.iter().enumerate(), features.iter().enumerate())
        .map(|((m, &metric), (f, &feature))| {
            let (success_avg, success_sd) = mean_and_std(&repetitions.relative_success(m, f));
            StatisticsRow {
                setup_id,
                metric,
                feature,
                success_avg,
                success_sd,
                num_successes: repetitions.total_corrects(m, f),
                num_fails: repetitions.total_fails(m, f),
            }
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub written: usize,
    pub failed: usize,
}

/// Write every row; a failed row is logged and the next one is attempted.
pub async fn write_statistics<K: ResultSink>(sink: &K, rows: &[StatisticsRow]) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();
    for row in rows {
        match sink.write_row(row).await {
            Ok(()) => outcome.written += 1,
            Err(err) => {
                error!(
                    setup_id = row.setup_id,
                    metric = row.metric.name(),
                    feature = row.feature.name(),
                    %err,
                    "failed to write statistics row"
                );
                outcome.failed += 1;
            }
        }
    }
    info!(written = outcome.written, failed = outcome.failed, "statistics written");
    outcome
}

use crate::data::trace::Trace;
use crate::error::MetricError;
use crate::metrics::{columns, Metric, MetricStrategy};

/// Absolute difference of the per-feature column sums.
pub struct ScalarCounts;

impl MetricStrategy for ScalarCounts {
    fn metric(&self) -> Metric {
        Metric::ScalarCounts
    }

    fn score(&self, client: &Trace, server: &Trace, feature: usize) -> Result<f64, MetricError> {
        let (c, s) = columns(client, server, feature)?;
        Ok((c.iter().sum::<f64>() - s.iter().sum::<f64>()).abs())
    }
}

use crate::data::trace::Trace;
use crate::error::MetricError;
use crate::metrics::{columns, Metric, MetricStrategy};

/// Root-mean-square error between the aligned feature columns.
pub struct Rmse;

impl MetricStrategy for Rmse {
    fn metric(&self) -> Metric {
        Metric::Rmse
    }

    fn score(&self, client: &Trace, server: &Trace, feature: usize) -> Result<f64, MetricError> {
        let (c, s) = columns(client, server, feature)?;
        let n = c.len().min(s.len());
        if n == 0 {
            return Err(MetricError::EmptyTrace);
        }
        let mse = c.iter().zip(s).map(|(x, y)| (x - y) * (x - y)).sum::<f64>() / n as f64;
        Ok(mse.sqrt())
    }
}

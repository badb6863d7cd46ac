use crate::data::trace::Trace;
use crate::error::MetricError;
use crate::metrics::{columns, Metric, MetricStrategy};

/// Absolute Pearson correlation between the aligned feature columns.
pub struct Pearson;

impl MetricStrategy for Pearson {
    fn metric(&self) -> Metric {
        Metric::Pearson
    }

    fn score(&self, client: &Trace, server: &Trace, feature: usize) -> Result<f64, MetricError> {
        let (c, s) = columns(client, server, feature)?;
        abs_pearson(c, s)
    }
}

/// |r| over the common prefix of `a` and `b`.
pub fn abs_pearson(a: &[f64], b: &[f64]) -> Result<f64, MetricError> {
    let n = a.len().min(b.len());
    if n == 0 {
        return Err(MetricError::EmptyTrace);
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return Err(MetricError::ZeroVariance);
    }
    let r = cov / (var_a * var_b).sqrt();
    if !r.is_finite() {
        return Err(MetricError::NotFinite);
    }
    Ok(r.abs().min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_and_inverse_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert!((abs_pearson(&a, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((abs_pearson(&a, &[8.0, 6.0, 4.0, 2.0]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn known_coefficient() {
        // r = 0.8 for this pair
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 1.0, 4.0, 3.0, 5.0];
        assert!((abs_pearson(&a, &b).unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_fail() {
        assert_eq!(abs_pearson(&[], &[]), Err(MetricError::EmptyTrace));
        assert_eq!(abs_pearson(&[1.0, 1.0], &[1.0, 2.0]), Err(MetricError::ZeroVariance));
        assert_eq!(abs_pearson(&[1.0], &[2.0]), Err(MetricError::ZeroVariance));
    }
}

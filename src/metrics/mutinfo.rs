use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::data::trace::Trace;
use crate::error::MetricError;
use crate::metrics::{columns, Metric, MetricStrategy};

/// Mutual information between the aligned feature columns, each distinct
/// value treated as its own category.
pub struct MutualInfo;

impl MetricStrategy for MutualInfo {
    fn metric(&self) -> Metric {
        Metric::MutualInfo
    }

    fn score(&self, client: &Trace, server: &Trace, feature: usize) -> Result<f64, MetricError> {
        let (c, s) = columns(client, server, feature)?;
        mutual_info(c, s)
    }
}

/// Discrete mutual information in nats, clipped at 0.
pub fn mutual_info(a: &[f64], b: &[f64]) -> Result<f64, MetricError> {
    let n = a.len().min(b.len());
    if n == 0 {
        return Err(MetricError::EmptyTrace);
    }

    // BTreeMap keeps the summation order stable between runs
    let mut joint: BTreeMap<(OrderedFloat<f64>, OrderedFloat<f64>), usize> = BTreeMap::new();
    let mut left: BTreeMap<OrderedFloat<f64>, usize> = BTreeMap::new();
    let mut right: BTreeMap<OrderedFloat<f64>, usize> = BTreeMap::new();
    for (&x, &y) in a[..n].iter().zip(&b[..n]) {
        let (x, y) = (OrderedFloat(x), OrderedFloat(y));
        *joint.entry((x, y)).or_default() += 1;
        *left.entry(x).or_default() += 1;
        *right.entry(y).or_default() += 1;
    }

    let total = n as f64;
    let mi: f64 = joint
        .iter()
        .map(|((x, y), &count)| {
            let nij = count as f64;
            let ai = left[x] as f64;
            let bj = right[y] as f64;
            (nij / total) * (nij * total / (ai * bj)).ln()
        })
        .sum();
    Ok(mi.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_labels_give_entropy() {
        let a = [1.0, 2.0, 1.0, 2.0];
        let mi = mutual_info(&a, &a).unwrap();
        assert!((mi - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn independent_labels_give_zero() {
        let a = [1.0, 1.0, 2.0, 2.0];
        let b = [5.0, 6.0, 5.0, 6.0];
        assert!(mutual_info(&a, &b).unwrap().abs() < 1e-12);
    }

    #[test]
    fn constant_column_has_no_information() {
        let a = [3.0, 3.0, 3.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(mutual_info(&a, &b), Ok(0.0));
    }

    #[test]
    fn relabelling_does_not_change_score() {
        let a = [1.0, 2.0, 3.0, 1.0, 2.0];
        let b = [10.0, 20.0, 30.0, 10.0, 20.0];
        assert!((mutual_info(&a, &b).unwrap() - mutual_info(&a, &a).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn empty_fails() {
        assert_eq!(mutual_info(&[], &[]), Err(MetricError::EmptyTrace));
    }
}

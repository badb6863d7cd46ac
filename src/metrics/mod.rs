//! Similarity metrics scoring an aligned client/server trace pair per feature.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PcaScope;
use crate::data::trace::{align, Trace};
use crate::error::MetricError;

pub mod mutinfo;
pub mod pca_pearson;
pub mod pearson;
pub mod rmse;
pub mod scalar;

pub use mutinfo::MutualInfo;
pub use pca_pearson::PcaPearson;
pub use pearson::Pearson;
pub use rmse::Rmse;
pub use scalar::ScalarCounts;

/// Traffic attributes captured per observed packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "packet_counts")]
    PacketCount,
    #[serde(rename = "inter_arrival_time")]
    InterArrivalTime,
    #[serde(rename = "packet_length")]
    PacketLength,
    #[serde(rename = "time_to_live")]
    TimeToLive,
    #[serde(rename = "window_size")]
    WindowSize,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::PacketCount,
        Feature::InterArrivalTime,
        Feature::PacketLength,
        Feature::TimeToLive,
        Feature::WindowSize,
    ];

    /// Column holding this feature in the traces table.
    pub fn column(&self) -> &'static str {
        match self {
            Feature::PacketCount => "packet_count",
            Feature::InterArrivalTime => "inter_arrival_time",
            Feature::PacketLength => "packet_length",
            Feature::TimeToLive => "time_to_live",
            Feature::WindowSize => "window_size",
        }
    }

    /// Name written to the results table.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::PacketCount => "packet_counts",
            Feature::InterArrivalTime => "inter_arrival_time",
            Feature::PacketLength => "packet_length",
            Feature::TimeToLive => "time_to_live",
            Feature::WindowSize => "window_size",
        }
    }
}

/// Which extreme of a metric's scores marks the most likely counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "scalar_counts")]
    ScalarCounts,
    #[serde(rename = "distance_pca_pearson")]
    PcaPearson,
    #[serde(rename = "distance_pearson")]
    Pearson,
    #[serde(rename = "distance_rmse")]
    Rmse,
    #[serde(rename = "distance_mutinfo")]
    MutualInfo,
}

impl Metric {
    pub const ALL: [Metric; 5] =
        [Metric::ScalarCounts, Metric::PcaPearson, Metric::Pearson, Metric::Rmse, Metric::MutualInfo];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::ScalarCounts => "scalar_counts",
            Metric::PcaPearson => "distance_pca_pearson",
            Metric::Pearson => "distance_pearson",
            Metric::Rmse => "distance_rmse",
            Metric::MutualInfo => "distance_mutinfo",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Metric::ScalarCounts | Metric::Rmse => Direction::LowerIsBetter,
            Metric::PcaPearson | Metric::Pearson | Metric::MutualInfo => Direction::HigherIsBetter,
        }
    }
}

/// A scoring function over two traces already truncated to equal length.
pub trait MetricStrategy: Send + Sync {
    fn metric(&self) -> Metric;

    /// Score one feature column.
    fn score(&self, client: &Trace, server: &Trace, feature: usize) -> Result<f64, MetricError>;

    /// Score every feature; override when the computation is shared across features.
    fn score_features(&self, client: &Trace, server: &Trace, n_features: usize) -> Vec<Result<f64, MetricError>> {
        (0..n_features).map(|f| self.score(client, server, f)).collect()
    }
}

/// Run a strategy and replace every failed or non-finite score with 0.
pub fn neutral_scores(strategy: &dyn MetricStrategy, client: &Trace, server: &Trace, n_features: usize) -> Vec<f64> {
    strategy
        .score_features(client, server, n_features)
        .into_iter()
        .enumerate()
        .map(|(feature, res)| match res.and_then(finite) {
            Ok(v) => v,
            Err(err) => {
                warn!(metric = strategy.metric().name(), feature, %err, "metric failed, using neutral score");
                0.0
            }
        })
        .collect()
}

fn finite(v: f64) -> Result<f64, MetricError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(MetricError::NotFinite)
    }
}

/// `(metric, feature) -> score` for one client/server pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreMatrix {
    scores: Vec<Vec<f64>>,
}

impl ScoreMatrix {
    pub fn from_rows(scores: Vec<Vec<f64>>) -> Self {
        Self { scores }
    }

    pub fn get(&self, metric: usize, feature: usize) -> Option<f64> {
        self.scores.get(metric).and_then(|row| row.get(feature)).copied()
    }

    pub fn row(&self, metric: usize) -> Option<&[f64]> {
        self.scores.get(metric).map(|r| r.as_slice())
    }

    pub fn n_metrics(&self) -> usize {
        self.scores.len()
    }
}

/// The ordered strategies applied to every client/server pair.
pub struct MetricSet {
    strategies: Vec<Box<dyn MetricStrategy>>,
}

impl MetricSet {
    pub fn new(strategies: Vec<Box<dyn MetricStrategy>>) -> Self {
        Self { strategies }
    }

    /// All five metrics in results-table order.
    pub fn standard(pca_scope: PcaScope) -> Self {
        Self::new(vec![
            Box::new(ScalarCounts),
            Box::new(PcaPearson::new(pca_scope)),
            Box::new(Pearson),
            Box::new(Rmse),
            Box::new(MutualInfo),
        ])
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.strategies.iter().map(|s| s.metric()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Align the pair, then score it with every strategy.
    pub fn score_pair(&self, client: &Trace, server: &Trace, n_features: usize) -> ScoreMatrix {
        let (client, server) = align(client, server);
        ScoreMatrix::from_rows(
            self.strategies
                .iter()
                .map(|s| neutral_scores(s.as_ref(), &client, &server, n_features))
                .collect(),
        )
    }
}

/// Fetch one feature column from both traces.
pub(crate) fn columns<'a>(
    client: &'a Trace,
    server: &'a Trace,
    feature: usize,
) -> Result<(&'a [f64], &'a [f64]), MetricError> {
    match (client.column(feature), server.column(feature)) {
        (Some(c), Some(s)) => Ok((c, s)),
        _ => Err(MetricError::FeatureOutOfRange(feature)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(len: usize, n_features: usize, scale: f64) -> Trace {
        Trace::new(
            (0..n_features)
                .map(|f| (0..len).map(|r| scale * ((r * (f + 2)) % 7) as f64 + r as f64).collect())
                .collect(),
        )
    }

    #[test]
    fn every_metric_returns_one_score_per_feature() {
        let set = MetricSet::standard(PcaScope::WholeTrace);
        for n in 1..=5 {
            let m = set.score_pair(&trace(20, n, 1.0), &trace(15, n, 2.0), n);
            assert_eq!(m.n_metrics(), 5);
            for metric in 0..5 {
                assert_eq!(m.row(metric).unwrap().len(), n);
            }
        }
    }

    #[test]
    fn pair_is_truncated_to_shorter_trace() {
        let client = Trace::new(vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0, 100.0]]);
        let server = Trace::new(vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]]);
        let m = MetricSet::standard(PcaScope::WholeTrace).score_pair(&client, &server, 1);
        assert_eq!(m.get(0, 0), Some(0.0));
        assert_eq!(m.get(3, 0), Some(0.0));
        assert!((m.get(2, 0).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn failures_become_neutral_scores() {
        // constant columns have no Pearson correlation
        let client = Trace::new(vec![vec![3.0; 6], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]]);
        let server = Trace::new(vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0]]);
        let scores = neutral_scores(&Pearson, &client, &server, 2);
        assert_eq!(scores[0], 0.0);
        assert!((scores[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn directions_match_metrics() {
        assert_eq!(Metric::ScalarCounts.direction(), Direction::LowerIsBetter);
        assert_eq!(Metric::Rmse.direction(), Direction::LowerIsBetter);
        assert_eq!(Metric::PcaPearson.direction(), Direction::HigherIsBetter);
        assert_eq!(Metric::Pearson.direction(), Direction::HigherIsBetter);
        assert_eq!(Metric::MutualInfo.direction(), Direction::HigherIsBetter);
    }

    #[test]
    fn feature_serde_uses_result_names() {
        let json = serde_json::to_string(&Feature::PacketCount).unwrap();
        assert_eq!(json, "\"packet_counts\"");
        assert_eq!(Feature::PacketCount.column(), "packet_count");
    }
}

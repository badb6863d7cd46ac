//! PCA-projected correlation.
//!
//! Each trace gets its own principal components; the score is the best
//! absolute Pearson correlation between same-index components of the client
//! and server projections, over the first [`MAX_SAMPLES`] projected rows.

use nalgebra::{DMatrix, SymmetricEigen};

use crate::config::PcaScope;
use crate::data::trace::Trace;
use crate::error::MetricError;
use crate::metrics::pearson::abs_pearson;
use crate::metrics::{Metric, MetricStrategy};

pub const N_COMPONENTS: usize = 3;
pub const MAX_SAMPLES: usize = 1000;

pub struct PcaPearson {
    scope: PcaScope,
}

impl PcaPearson {
    pub fn new(scope: PcaScope) -> Self {
        Self { scope }
    }

    fn score_columns(&self, client: &Trace, server: &Trace, cols: &[usize]) -> Result<f64, MetricError> {
        let client_pca = project(client, cols)?;
        let server_pca = project(server, cols)?;
        let n = client_pca.nrows().min(server_pca.nrows()).min(MAX_SAMPLES);

        let mut best = 0.0;
        for component in 0..N_COMPONENTS {
            let c: Vec<f64> = client_pca.column(component).iter().take(n).copied().collect();
            let s: Vec<f64> = server_pca.column(component).iter().take(n).copied().collect();
            // a degenerate component just cannot win
            if let Ok(r) = abs_pearson(&c, &s) {
                if r > best {
                    best = r;
                }
            }
        }
        Ok(best)
    }
}

impl MetricStrategy for PcaPearson {
    fn metric(&self) -> Metric {
        Metric::PcaPearson
    }

    fn score(&self, client: &Trace, server: &Trace, feature: usize) -> Result<f64, MetricError> {
        let n_features = client.n_features().min(server.n_features());
        match self.scope {
            PcaScope::WholeTrace => self.score_columns(client, server, &(0..n_features).collect::<Vec<_>>()),
            PcaScope::FeatureSliced => {
                if feature >= n_features {
                    return Err(MetricError::FeatureOutOfRange(feature));
                }
                let cols: Vec<usize> = (0..n_features).filter(|&f| f != feature).collect();
                self.score_columns(client, server, &cols)
            }
        }
    }

    fn score_features(&self, client: &Trace, server: &Trace, n_features: usize) -> Vec<Result<f64, MetricError>> {
        match self.scope {
            // one projection of the whole trace, repeated for every feature
            PcaScope::WholeTrace => vec![self.score(client, server, 0); n_features],
            PcaScope::FeatureSliced => (0..n_features).map(|f| self.score(client, server, f)).collect(),
        }
    }
}

/// Project the selected columns onto their top principal components.
///
/// Returns an `n_rows x N_COMPONENTS` matrix of centred scores, components
/// ordered by decreasing explained variance.
pub fn project(trace: &Trace, cols: &[usize]) -> Result<DMatrix<f64>, MetricError> {
    if trace.is_empty() {
        return Err(MetricError::EmptyTrace);
    }
    if cols.len() < N_COMPONENTS {
        return Err(MetricError::TooFewFeatures { needed: N_COMPONENTS, got: cols.len() });
    }
    if trace.len() < N_COMPONENTS {
        return Err(MetricError::TooFewSamples { needed: N_COMPONENTS, got: trace.len() });
    }

    let data: Vec<&[f64]> = cols
        .iter()
        .map(|&c| trace.column(c).ok_or(MetricError::FeatureOutOfRange(c)))
        .collect::<Result<_, _>>()?;

    let n = trace.len();
    let mut x = DMatrix::from_fn(n, data.len(), |r, c| data[c][r]);
    for mut col in x.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }

    let cov = (x.transpose() * &x) / (n as f64 - 1.0);
    let eigen = SymmetricEigen::new(cov);

    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let basis = DMatrix::from_fn(data.len(), N_COMPONENTS, |r, c| eigen.eigenvectors[(r, order[c])]);
    let projected = x * basis;
    if projected.iter().any(|v| !v.is_finite()) {
        return Err(MetricError::NotFinite);
    }
    Ok(projected)
}

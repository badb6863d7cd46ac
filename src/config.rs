use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::metrics::Feature;

/// What happens to the rest of a repetition when a client or server trace is missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MissingTracePolicy {
    /// Stop evaluating clients and discard the repetition's table.
    AbortRepetition,
    /// Skip only the affected client and keep going.
    SkipClient,
}

/// Policy applied when nothing else is configured.
pub const MISSING_TRACE_POLICY: MissingTracePolicy = MissingTracePolicy::AbortRepetition;

impl Default for MissingTracePolicy {
    fn default() -> Self {
        MISSING_TRACE_POLICY
    }
}

/// Which columns the PCA-projected correlation is fit on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PcaScope {
    /// Fit on every feature column; the score repeats across all features.
    #[default]
    WholeTrace,
    /// Fit on every feature column except the one being scored.
    FeatureSliced,
}

/// Names of the three tables backing the trace source and the results sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub traces: String,
    pub setups: String,
    pub results: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            traces: "traces_submission".to_string(),
            setups: "setups_submission".to_string(),
            results: "ta_submission".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub db_path: PathBuf,
    pub tables: TableNames,
    /// Servers are stored under node ids `offset .. offset + server_count`.
    pub server_node_offset: i64,
    pub missing_trace_policy: MissingTracePolicy,
    pub pca_scope: PcaScope,
    pub features: Vec<Feature>,
    pub create_results_table: bool,
    pub show_progress: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("traffic.db"),
            tables: TableNames::default(),
            server_node_offset: 31,
            missing_trace_policy: MissingTracePolicy::default(),
            pca_scope: PcaScope::default(),
            features: Feature::ALL.to_vec(),
            create_results_table: true,
            show_progress: true,
        }
    }
}

impl AnalysisConfig {
    /// Load a config from JSON; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }
}

/// Which setups a run covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSelection {
    All,
    Single(i64),
}

impl FromStr for SetupSelection {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(SetupSelection::All);
        }
        s.trim()
            .parse::<i64>()
            .map(SetupSelection::Single)
            .map_err(|_| AnalysisError::InvalidSelection(s.to_string()))
    }
}

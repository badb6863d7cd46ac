//! Error types for the analysis pipeline.

use thiserror::Error;

/// Failures surfaced by the store, the config layer and the pipeline.
///
/// None of these abort a multi-setup batch on their own: the pipeline logs
/// them and moves on to the next repetition or setup.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Blocking store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Store connection lock poisoned")]
    LockPoisoned,

    #[error("Unknown topology '{0}'")]
    UnknownTopology(String),

    #[error("Setup {0} not found")]
    SetupNotFound(i64),

    #[error("Invalid setup selection '{0}', expected a setup id or 'all'")]
    InvalidSelection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Why a single metric could not score a single feature.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Empty trace")]
    EmptyTrace,

    #[error("Zero variance column")]
    ZeroVariance,

    #[error("Too few samples: need {needed}, got {got}")]
    TooFewSamples { needed: usize, got: usize },

    #[error("Too few features: need {needed}, got {got}")]
    TooFewFeatures { needed: usize, got: usize },

    #[error("Score is not finite")]
    NotFinite,

    #[error("Feature index {0} out of range")]
    FeatureOutOfRange(usize),
}

//! Drives the per-setup, per-repetition, per-client comparison loop.
//!
//! Every fetch and write is awaited before the next one is issued; metric and
//! verification work runs synchronously between those points. Repetitions,
//! clients and servers are visited in ascending index order.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::{AnalysisConfig, MissingTracePolicy, SetupSelection};
use crate::data::source::{ResultSink, TraceSource};
use crate::data::trace::{partition_by_node, Trace};
use crate::error::Result;
use crate::metrics::{MetricSet, ScoreMatrix};
use crate::results::{RepetitionCollection, ResultTable};
use crate::setup::SetupDescriptor;
use crate::stats::{aggregate, write_statistics, StatisticsRow, WriteOutcome};
use crate::verify::verify_guesses;

/// What happened to one client of a repetition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClientOutcome {
    Evaluated,
    MissingTrace,
}

/// What happened to one repetition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepetitionOutcome {
    /// Every client that counts was evaluated; the table is ready to freeze.
    Complete { table: ResultTable, skipped_clients: u32 },
    /// A missing trace invalidated the repetition; its table is dropped.
    Discarded { evaluated_clients: u32 },
    /// The source holds no data for the repetition.
    NoData,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepetitionCounts {
    pub kept: u32,
    pub discarded: u32,
    pub without_data: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetupReport {
    pub descriptor: SetupDescriptor,
    pub repetitions: RepetitionCounts,
    pub rows: Vec<StatisticsRow>,
    pub written: WriteOutcome,
}

/// Totals over a whole batch of setups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub setups_analyzed: u32,
    pub setups_skipped: u32,
    pub repetitions_kept: u32,
    pub repetitions_discarded: u32,
    pub repetitions_without_data: u32,
    pub rows_written: usize,
    pub rows_failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub rows: Vec<StatisticsRow>,
}

pub struct Analyzer<'a, S> {
    source: &'a S,
    config: &'a AnalysisConfig,
    metrics: MetricSet,
}

impl<'a, S: TraceSource> Analyzer<'a, S> {
    pub fn new(source: &'a S, config: &'a AnalysisConfig) -> Self {
        Self::with_metrics(source, config, MetricSet::standard(config.pca_scope))
    }

    pub fn with_metrics(source: &'a S, config: &'a AnalysisConfig, metrics: MetricSet) -> Self {
        Self { source, config, metrics }
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    pub async fn descriptor(&self, setup_id: i64) -> Result<SetupDescriptor> {
        let record = self.source.setup_record(setup_id).await?;
        SetupDescriptor::new(setup_id, &record, self.config.features.clone(), self.metrics.len())
    }

    /// Run every repetition of a setup and collect the tables that completed.
    pub async fn analyze_repetitions(&self, d: &SetupDescriptor) -> (RepetitionCollection, RepetitionCounts) {
        let mut collection = RepetitionCollection::new();
        let mut counts = RepetitionCounts::default();

        let pb = if self.config.show_progress {
            ProgressBar::new(d.repetition_count as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})") {
            pb.set_style(style.progress_chars("##-"));
        }

        for repetition in 1..=d.repetition_count {
            match self.analyze_repetition(d, repetition).await {
                RepetitionOutcome::Complete { table, .. } => {
                    collection.push(table);
                    counts.kept += 1;
                }
                RepetitionOutcome::Discarded { .. } => counts.discarded += 1,
                RepetitionOutcome::NoData => counts.without_data += 1,
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        (collection, counts)
    }

    #[instrument(skip(self, d), fields(setup_id = d.setup_id))]
    pub async fn analyze_repetition(&self, d: &SetupDescriptor, repetition: u32) -> RepetitionOutcome {
        match self.source.repetition_exists(d.setup_id, repetition).await {
            Ok(true) => {}
            Ok(false) => {
                info!("no data for repetition, skipping");
                return RepetitionOutcome::NoData;
            }
            Err(err) => {
                error!(%err, "repetition check failed, skipping");
                return RepetitionOutcome::NoData;
            }
        }

        let mut table = ResultTable::new(self.metrics.len(), d.feature_count());
        let mut evaluated = 0;
        let mut skipped = 0;
        for client_index in 1..=d.client_count {
            match self.evaluate_client(d, repetition, client_index, &mut table).await {
                ClientOutcome::Evaluated => evaluated += 1,
                ClientOutcome::MissingTrace => match self.config.missing_trace_policy {
                    MissingTracePolicy::AbortRepetition => {
                        warn!(client_index, evaluated, "missing trace, discarding repetition");
                        return RepetitionOutcome::Discarded { evaluated_clients: evaluated };
                    }
                    MissingTracePolicy::SkipClient => {
                        warn!(client_index, "missing trace, skipping client");
                        skipped += 1;
                    }
                },
            }
        }

        if evaluated == 0 {
            return RepetitionOutcome::Discarded { evaluated_clients: 0 };
        }
        RepetitionOutcome::Complete { table, skipped_clients: skipped }
    }

    async fn evaluate_client(
        &self,
        d: &SetupDescriptor,
        repetition: u32,
        client_index: u32,
        table: &mut ResultTable,
    ) -> ClientOutcome {
        let n_features = d.feature_count();

        let client = match self.source.node_trace(d.setup_id, repetition, client_index as i64, &d.features).await {
            Ok(rows) => Trace::from_rows(rows, n_features),
            Err(err) => {
                error!(client_index, %err, "client trace fetch failed");
                return ClientOutcome::MissingTrace;
            }
        };
        if client.is_empty() {
            return ClientOutcome::MissingTrace;
        }

        let server_ids = d.server_node_ids(self.config.server_node_offset);
        let mut servers = match self.source.node_set_traces(d.setup_id, repetition, &server_ids, &d.features).await {
            Ok(rows) => partition_by_node(rows, n_features),
            Err(err) => {
                error!(client_index, %err, "server trace fetch failed");
                return ClientOutcome::MissingTrace;
            }
        };

        let mut per_server: Vec<ScoreMatrix> = Vec::with_capacity(server_ids.len());
        for node_id in &server_ids {
            let Some(server) = servers.remove(node_id).filter(|t| !t.is_empty()) else {
                warn!(client_index, server_node = node_id, "missing server trace");
                return ClientOutcome::MissingTrace;
            };
            per_server.push(self.metrics.score_pair(&client, &server, n_features));
        }

        verify_guesses(table, &per_server, &self.metrics.metrics(), n_features, d.target_for(client_index));
        ClientOutcome::Evaluated
    }
}

/// Analyse one setup end to end and persist its statistics.
#[instrument(skip(source, sink, config))]
pub async fn analyze_setup<S, K>(source: &S, sink: &K, setup_id: i64, config: &AnalysisConfig) -> Result<SetupReport>
where
    S: TraceSource,
    K: ResultSink,
{
    let analyzer = Analyzer::new(source, config);
    let descriptor = analyzer.descriptor(setup_id).await?;
    info!(
        topology = ?descriptor.topology,
        clients = descriptor.client_count,
        servers = descriptor.server_count(),
        repetitions = descriptor.repetition_count,
        "analysing setup"
    );

    let (collection, repetitions) = analyzer.analyze_repetitions(&descriptor).await;
    let rows = aggregate(setup_id, &collection, &analyzer.metrics().metrics(), &descriptor.features);
    let written = write_statistics(sink, &rows).await;

    Ok(SetupReport { descriptor, repetitions, rows, written })
}

/// Analyse the selected setups; a failing setup is logged and skipped.
pub async fn analyze_setups<S, K>(source: &S, sink: &K, selection: SetupSelection, config: &AnalysisConfig) -> RunReport
where
    S: TraceSource,
    K: ResultSink,
{
    let mut report = RunReport::default();

    let setup_ids: Vec<i64> = match selection {
        SetupSelection::Single(id) => vec![id],
        SetupSelection::All => match source.setup_count().await {
            Ok(count) => (1..=count).collect(),
            Err(err) => {
                error!(%err, "could not count setups");
                return report;
            }
        },
    };

    let total = setup_ids.len();
    for (i, setup_id) in setup_ids.into_iter().enumerate() {
        info!("Setup {}/{} (id {})", i + 1, total, setup_id);
        match analyze_setup(source, sink, setup_id, config).await {
            Ok(setup) => {
                let s = &mut report.summary;
                s.setups_analyzed += 1;
                s.repetitions_kept += setup.repetitions.kept;
                s.repetitions_discarded += setup.repetitions.discarded;
                s.repetitions_without_data += setup.repetitions.without_data;
                s.rows_written += setup.written.written;
                s.rows_failed += setup.written.failed;
                report.rows.extend(setup.rows);
            }
            Err(err) => {
                error!(setup_id, %err, "skipping setup");
                report.summary.setups_skipped += 1;
            }
        }
    }

    info!(summary = ?report.summary, "analysis finished");
    report
}

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use traffic_confirmation::config::{AnalysisConfig, MissingTracePolicy, PcaScope, SetupSelection};
use traffic_confirmation::data::sqlite::SqliteStore;
use traffic_confirmation::pipeline::analyze_setups;
use traffic_confirmation::report::{render_table, write_json};

#[derive(Parser)]
#[command(name = "ta")]
#[command(about = "Evaluate traffic confirmation metrics over captured client/server traces")]
struct Cli {
    /// Setup id to analyse, or "all"
    #[arg(long, default_value = "all")]
    setup: String,

    /// SQLite database holding setups, traces and results
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// What to do when a client or server trace is missing
    #[arg(long, value_enum)]
    policy: Option<MissingTracePolicy>,

    /// Columns the PCA-projected correlation is fit on
    #[arg(long, value_enum)]
    pca_scope: Option<PcaScope>,

    /// Also export the statistics as JSON
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// No progress bar or summary table
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // --- 1. Config ---
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(policy) = cli.policy {
        config.missing_trace_policy = policy;
    }
    if let Some(scope) = cli.pca_scope {
        config.pca_scope = scope;
    }
    config.show_progress = !cli.quiet;
    let selection: SetupSelection = cli.setup.parse()?;

    // --- 2. Store ---
    let store = SqliteStore::open(&config.db_path, config.tables.clone())
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    if config.create_results_table {
        store.create_results_table().await?;
    }
    info!(db = %config.db_path.display(), ?selection, "starting analysis");

    // --- 3. Analyse and export ---
    let report = analyze_setups(&store, &store, selection, &config).await;

    if !cli.quiet {
        println!("{}", render_table(&report.rows));
    }
    if let Some(path) = cli.json_out {
        write_json(&report, &path).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

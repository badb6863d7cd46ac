use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use crate::error::Result;
use crate::pipeline::RunReport;
use crate::stats::StatisticsRow;

/// Render statistics rows as a terminal table.
pub fn render_table(rows: &[StatisticsRow]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["setup", "metric", "feature", "success avg", "success sd", "corrects", "fails"]);

    for row in rows {
        table.add_row(vec![
            Cell::new(row.setup_id),
            Cell::new(row.metric.name()),
            Cell::new(row.feature.name()),
            Cell::new(format!("{:.4}", row.success_avg)),
            Cell::new(format!("{:.4}", row.success_sd)),
            Cell::new(row.num_successes),
            Cell::new(row.num_fails),
        ]);
    }
    table.to_string()
}

/// Dump the run summary and every row as pretty JSON.
pub fn write_json(report: &RunReport, path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

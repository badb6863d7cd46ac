use std::path::Path;
use std::sync::{Arc, Mutex};

use itertools::Itertools;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tokio::task;
use tracing::debug;

use crate::config::TableNames;
use crate::data::source::{ResultSink, TraceSource};
use crate::error::{AnalysisError, Result};
use crate::metrics::Feature;
use crate::setup::SetupRecord;
use crate::stats::StatisticsRow;

/// SQLite-backed trace source and results sink.
///
/// Table names come from config and column names only from [`Feature`], so
/// nothing user-typed is spliced into SQL beyond the quoted table identifiers.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    tables: TableNames,
}

fn quoted(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn feature_columns(features: &[Feature]) -> String {
    features.iter().map(|f| quoted(f.column())).join(", ")
}

impl SqliteStore {
    pub fn open(path: &Path, tables: TableNames) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn, tables))
    }

    pub fn open_in_memory(tables: TableNames) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, tables))
    }

    pub fn from_connection(conn: Connection, tables: TableNames) -> Self {
        Self { conn: Arc::new(Mutex::new(conn)), tables }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Run `f` against the connection on the blocking pool and wait for it.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection, &TableNames) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let tables = self.tables.clone();
        task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| AnalysisError::LockPoisoned)?;
            f(&guard, &tables)
        })
        .await?
    }

    pub async fn create_input_tables(&self) -> Result<()> {
        self.run(|conn, tables| {
            let feature_defs = Feature::ALL.iter().map(|f| format!("{} REAL", quoted(f.column()))).join(", ");
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {setups} (
                    id INTEGER PRIMARY KEY, setup TEXT, num_clients INTEGER, repetitions INTEGER
                );
                CREATE TABLE IF NOT EXISTS {traces} (
                    setup_id INTEGER, repetition INTEGER, node_id INTEGER, {feature_defs}
                );",
                setups = quoted(&tables.setups),
                traces = quoted(&tables.traces),
            ))?;
            Ok(())
        })
        .await
    }

    pub async fn create_results_table(&self) -> Result<()> {
        self.run(|conn, tables| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    setup_id INTEGER, metric TEXT, feature TEXT,
                    success_avg REAL, success_sd REAL,
                    num_successes INTEGER, num_fails INTEGER
                );",
                quoted(&tables.results)
            ))?;
            Ok(())
        })
        .await
    }

    pub async fn insert_setup(&self, id: i64, topology: &str, num_clients: u32, repetitions: u32) -> Result<()> {
        let topology = topology.to_string();
        self.run(move |conn, tables| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (id, setup, num_clients, repetitions) VALUES (?1, ?2, ?3, ?4)",
                    quoted(&tables.setups)
                ),
                params![id, topology, num_clients, repetitions],
            )?;
            Ok(())
        })
        .await
    }

    /// Append the captured rows of one node; each row holds all five features in order.
    pub async fn insert_trace(&self, setup_id: i64, repetition: u32, node_id: i64, rows: Vec<[f64; 5]>) -> Result<()> {
        self.run(move |conn, tables| {
            let placeholders = (4..4 + Feature::ALL.len()).map(|i| format!("?{}", i)).join(", ");
            let sql = format!(
                "INSERT INTO {} (setup_id, repetition, node_id, {}) VALUES (?1, ?2, ?3, {})",
                quoted(&tables.traces),
                feature_columns(&Feature::ALL),
                placeholders
            );
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for row in &rows {
                    stmt.execute(params![setup_id, repetition, node_id, row[0], row[1], row[2], row[3], row[4]])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Every statistics row in insertion order.
    pub async fn load_results(&self) -> Result<Vec<(i64, String, String, f64, f64, i64, i64)>> {
        self.run(|conn, tables| {
            let mut stmt = conn.prepare(&format!(
                "SELECT setup_id, metric, feature, success_avg, success_sd, num_successes, num_fails
                 FROM {} ORDER BY rowid",
                quoted(&tables.results)
            ))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

impl TraceSource for SqliteStore {
    async fn setup_count(&self) -> Result<i64> {
        self.run(|conn, tables| {
            let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", quoted(&tables.setups)), [], |r| r.get(0))?;
            Ok(count)
        })
        .await
    }

    async fn setup_record(&self, setup_id: i64) -> Result<SetupRecord> {
        self.run(move |conn, tables| {
            conn.query_row(
                &format!(
                    "SELECT setup, num_clients, repetitions FROM {} WHERE id = ?1",
                    quoted(&tables.setups)
                ),
                params![setup_id],
                |row| {
                    Ok(SetupRecord {
                        topology: row.get(0)?,
                        num_clients: row.get(1)?,
                        repetitions: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(AnalysisError::SetupNotFound(setup_id))
        })
        .await
    }

    async fn repetition_exists(&self, setup_id: i64, repetition: u32) -> Result<bool> {
        self.run(move |conn, tables| {
            let exists: i64 = conn.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE setup_id = ?1 AND repetition = ?2)",
                    quoted(&tables.traces)
                ),
                params![setup_id, repetition],
                |r| r.get(0),
            )?;
            Ok(exists == 1)
        })
        .await
    }

    async fn node_trace(
        &self,
        setup_id: i64,
        repetition: u32,
        node_id: i64,
        features: &[Feature],
    ) -> Result<Vec<Vec<f64>>> {
        let features = features.to_vec();
        self.run(move |conn, tables| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE repetition = ?1 AND setup_id = ?2 AND node_id = ?3 ORDER BY rowid",
                feature_columns(&features),
                quoted(&tables.traces)
            ))?;
            let n = features.len();
            let rows = stmt
                .query_map(params![repetition, setup_id, node_id], |row| {
                    (0..n).map(|i| row.get::<_, f64>(i)).collect::<rusqlite::Result<Vec<f64>>>()
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            debug!(setup_id, repetition, node_id, rows = rows.len(), "fetched node trace");
            Ok(rows)
        })
        .await
    }

    async fn node_set_traces(
        &self,
        setup_id: i64,
        repetition: u32,
        node_ids: &[i64],
        features: &[Feature],
    ) -> Result<Vec<(i64, Vec<f64>)>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let features = features.to_vec();
        let node_ids = node_ids.to_vec();
        self.run(move |conn, tables| {
            let id_placeholders = (3..3 + node_ids.len()).map(|i| format!("?{}", i)).join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT node_id, {} FROM {} WHERE repetition = ?1 AND setup_id = ?2 AND node_id IN ({}) ORDER BY rowid",
                feature_columns(&features),
                quoted(&tables.traces),
                id_placeholders
            ))?;
            let bound = [repetition as i64, setup_id].into_iter().chain(node_ids.iter().copied());
            let n = features.len();
            let rows = stmt
                .query_map(params_from_iter(bound), |row| {
                    let node_id: i64 = row.get(0)?;
                    let values = (1..=n).map(|i| row.get::<_, f64>(i)).collect::<rusqlite::Result<Vec<f64>>>()?;
                    Ok((node_id, values))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            debug!(setup_id, repetition, nodes = node_ids.len(), rows = rows.len(), "fetched server traces");
            Ok(rows)
        })
        .await
    }
}

impl ResultSink for SqliteStore {
    async fn write_row(&self, row: &StatisticsRow) -> Result<()> {
        let row = row.clone();
        self.run(move |conn, tables| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (setup_id, metric, feature, success_avg, success_sd, num_successes, num_fails)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    quoted(&tables.results)
                ),
                params![
                    row.setup_id,
                    row.metric.name(),
                    row.feature.name(),
                    row.success_avg,
                    row.success_sd,
                    row.num_successes as i64,
                    row.num_fails as i64,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metric;

    async fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory(TableNames::default()).unwrap();
        store.create_input_tables().await.unwrap();
        store.create_results_table().await.unwrap();
        store
    }

    #[tokio::test]
    async fn setup_round_trip_and_count() {
        let s = store().await;
        s.insert_setup(1, "directed", 4, 10).await.unwrap();
        s.insert_setup(2, "grouped", 6, 3).await.unwrap();
        assert_eq!(s.setup_count().await.unwrap(), 2);
        let rec = s.setup_record(2).await.unwrap();
        assert_eq!(rec, SetupRecord { topology: "grouped".into(), num_clients: 6, repetitions: 3 });
        assert!(matches!(s.setup_record(9).await, Err(AnalysisError::SetupNotFound(9))));
    }

    #[tokio::test]
    async fn traces_come_back_in_requested_feature_order() {
        let s = store().await;
        s.insert_trace(1, 1, 1, vec![[1.0, 2.0, 3.0, 4.0, 5.0], [6.0, 7.0, 8.0, 9.0, 10.0]]).await.unwrap();
        assert!(s.repetition_exists(1, 1).await.unwrap());
        assert!(!s.repetition_exists(1, 2).await.unwrap());

        let rows = s.node_trace(1, 1, 1, &[Feature::WindowSize, Feature::PacketCount]).await.unwrap();
        assert_eq!(rows, vec![vec![5.0, 1.0], vec![10.0, 6.0]]);
        assert!(s.node_trace(1, 1, 2, &Feature::ALL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn node_set_rows_are_prefixed_with_ids() {
        let s = store().await;
        s.insert_trace(1, 1, 31, vec![[1.0; 5]]).await.unwrap();
        s.insert_trace(1, 1, 32, vec![[2.0; 5], [3.0; 5]]).await.unwrap();
        s.insert_trace(1, 1, 1, vec![[9.0; 5]]).await.unwrap();

        let rows = s.node_set_traces(1, 1, &[31, 32], &[Feature::PacketLength]).await.unwrap();
        assert_eq!(rows, vec![(31, vec![1.0]), (32, vec![2.0]), (32, vec![3.0])]);
    }

    #[tokio::test]
    async fn statistics_rows_are_appended() {
        let s = store().await;
        let row = StatisticsRow {
            setup_id: 3,
            metric: Metric::Rmse,
            feature: Feature::TimeToLive,
            success_avg: 0.5,
            success_sd: 0.25,
            num_successes: 4,
            num_fails: 4,
        };
        s.write_row(&row).await.unwrap();
        let stored = s.load_results().await.unwrap();
        assert_eq!(
            stored,
            vec![(3, "distance_rmse".to_string(), "time_to_live".to_string(), 0.5, 0.25, 4, 4)]
        );
    }
}

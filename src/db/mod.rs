//! Record sink backed by SQLite.
//!
//! Every call opens its own connection, does its work and closes the
//! connection before returning, so nothing is held between pipeline cycles.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use thiserror::Error;

pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

use migrations::run_migrations;

use crate::{
    log_debug, log_error, log_info, log_warn,
    models::{Assessment, Reading},
    settings::DatabaseSettings,
    utils::LogContext,
};

pub use models::StoredRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot open database {path}: {source}")]
    Connection {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("database write failed: {0}")]
    Write(String),
    #[error("database read failed: {0}")]
    Read(String),
}

/// Capability the pipeline uses to store an annotated reading.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn persist(&self, reading: &Reading, assessment: &Assessment) -> Result<(), SinkError>;
}

#[derive(Clone)]
pub struct RecordSink {
    db_path: PathBuf,
    busy_timeout: Duration,
    log: LogContext,
}

impl RecordSink {
    pub fn new(settings: &DatabaseSettings, log: LogContext) -> Self {
        Self {
            db_path: settings.path.clone(),
            busy_timeout: Duration::from_millis(settings.busy_timeout_ms),
            log,
        }
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Creates the database directory and schema. Run once at startup.
    pub async fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        self.execute(|conn| {
            run_migrations(conn).map_err(|err| SinkError::Write(format!("{err:#}")))
        })
        .await
        .context("failed to initialize database schema")?;

        log_info!(self.log, "Database initialized at {}", self.db_path.display());
        Ok(())
    }

    /// Runs `task` on a fresh connection in the blocking pool.
    ///
    /// The connection is closed on every path, including task errors.
    async fn execute<F, T>(&self, task: F) -> Result<T, SinkError>
    where
        F: FnOnce(&mut Connection) -> Result<T, SinkError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.db_path.clone();
        let busy_timeout = self.busy_timeout;
        let log = self.log;

        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&path, busy_timeout)?;
            let result = task(&mut conn);
            match conn.close() {
                Ok(()) => log_debug!(log, "database connection closed"),
                Err((_conn, err)) => log_warn!(log, "database connection close failed: {err}"),
            }
            result
        })
        .await
        .map_err(|err| SinkError::Write(format!("database worker failed: {err}")))?
    }
}

fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection, SinkError> {
    let connection_err = |source| SinkError::Connection {
        path: path.display().to_string(),
        source,
    };

    let conn = Connection::open(path).map_err(connection_err)?;
    conn.busy_timeout(busy_timeout).map_err(connection_err)?;
    Ok(conn)
}

#[async_trait]
impl RecordStore for RecordSink {
    async fn persist(&self, reading: &Reading, assessment: &Assessment) -> Result<(), SinkError> {
        match self.insert_record(reading, assessment).await {
            Ok(row_id) => {
                log_info!(self.log, "record stored for {} (row {row_id})", reading.patient_id);
                Ok(())
            }
            Err(err) => {
                log_error!(self.log, "record for {} dropped: {err}", reading.patient_id);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EcgRhythm;
    use chrono::NaiveDate;

    fn sink_at(path: PathBuf) -> RecordSink {
        RecordSink::new(
            &DatabaseSettings {
                path,
                busy_timeout_ms: 1_000,
            },
            LogContext::silent("db"),
        )
    }

    fn reading(patient_id: &str, second: u32) -> Reading {
        Reading {
            patient_id: patient_id.into(),
            timestamp: NaiveDate::from_ymd_opt(2026, 4, 1)
                .and_then(|d| d.and_hms_opt(10, 15, second))
                .unwrap(),
            pulse_rate: 74,
            oxygen_saturation: 97.6,
            respiration_rate: 15,
            temperature: 36.9,
            ecg_rhythm: EcgRhythm::Bradycardia,
            raw_amplitude: 450,
            raw_bpm: 72,
        }
    }

    #[tokio::test]
    async fn persists_every_column_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.sqlite3");
        let sink = sink_at(path.clone());
        sink.initialize().await.unwrap();

        sink.persist(&reading("PT-1001", 5), &Assessment::new("Stable, recheck in 1h."))
            .await
            .unwrap();

        let conn = Connection::open(&path).unwrap();
        let row: (String, String, i32, f64, i32, f64, String, String, i32, i32) = conn
            .query_row(
                "SELECT patient_id, time, pulse_rate, oxygen_saturation, respiration_rate,
                        temperature, ecg_rhythm, health_status, a0_value, current_bpm
                 FROM patient_data",
                [],
                |r| {
                    Ok((
                        r.get(0)?,
                        r.get(1)?,
                        r.get(2)?,
                        r.get(3)?,
                        r.get(4)?,
                        r.get(5)?,
                        r.get(6)?,
                        r.get(7)?,
                        r.get(8)?,
                        r.get(9)?,
                    ))
                },
            )
            .unwrap();

        assert_eq!(
            row,
            (
                "PT-1001".to_string(),
                "2026-04-01 10:15:05".to_string(),
                74,
                97.6,
                15,
                36.9,
                "Bradycardia".to_string(),
                "Stable, recheck in 1h.".to_string(),
                450,
                72,
            )
        );
    }

    #[tokio::test]
    async fn fetches_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_at(dir.path().join("records.sqlite3"));

        sink.persist(&reading("PT-1001", 1), &Assessment::new("first")).await.unwrap();
        sink.persist(&reading("PT-1002", 2), &Assessment::new("second")).await.unwrap();

        let records = sink.fetch_recent_records(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reading, reading("PT-1002", 2));
        assert_eq!(records[0].assessment.text, "second");
        assert_eq!(records[1].reading.patient_id, "PT-1001");
    }

    #[tokio::test]
    async fn unreachable_database_is_a_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_at(dir.path().join("missing").join("dir").join("records.sqlite3"));

        let err = sink
            .persist(&reading("PT-1003", 3), &Assessment::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Connection { .. }), "{err}");
    }

    #[tokio::test]
    async fn recovers_after_table_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.sqlite3");
        let sink = sink_at(path.clone());
        sink.initialize().await.unwrap();
        sink.persist(&reading("PT-1004", 4), &Assessment::new("before")).await.unwrap();

        Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE IF EXISTS patient_data")
            .unwrap();

        sink.persist(&reading("PT-1005", 5), &Assessment::new("after")).await.unwrap();
        let records = sink.fetch_recent_records(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].assessment.text, "after");
    }

    #[tokio::test]
    async fn write_failure_leaves_no_partial_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.sqlite3");
        let sink = sink_at(path.clone());
        sink.initialize().await.unwrap();

        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_insert BEFORE INSERT ON patient_data
                 BEGIN SELECT RAISE(ABORT, 'read only'); END;",
            )
            .unwrap();

        let err = sink
            .persist(&reading("PT-1006", 6), &Assessment::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Write(_)), "{err}");

        let count: i64 = Connection::open(&path)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM patient_data", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}

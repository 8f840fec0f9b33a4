use rusqlite::{params, Row};

use crate::db::{
    helpers::{format_time, parse_rhythm, parse_time},
    migrations::run_migrations,
    models::StoredRecord,
    RecordSink, SinkError,
};
use crate::models::{Assessment, Reading};

fn write_err(err: impl std::fmt::Display) -> SinkError {
    SinkError::Write(err.to_string())
}

fn row_to_record(row: &Row) -> anyhow::Result<StoredRecord> {
    let time: String = row.get("time")?;
    let rhythm: String = row.get("ecg_rhythm")?;

    Ok(StoredRecord {
        id: row.get("id")?,
        reading: Reading {
            patient_id: row.get("patient_id")?,
            timestamp: parse_time(&time, "time")?,
            pulse_rate: row.get("pulse_rate")?,
            oxygen_saturation: row.get("oxygen_saturation")?,
            respiration_rate: row.get("respiration_rate")?,
            temperature: row.get("temperature")?,
            ecg_rhythm: parse_rhythm(&rhythm)?,
            raw_amplitude: row.get("a0_value")?,
            raw_bpm: row.get("current_bpm")?,
        },
        assessment: Assessment::new(row.get::<_, String>("health_status")?),
    })
}

impl RecordSink {
    /// Inserts one row inside its own transaction and returns the new row id.
    pub async fn insert_record(
        &self,
        reading: &Reading,
        assessment: &Assessment,
    ) -> Result<i64, SinkError> {
        let reading = reading.clone();
        let assessment = assessment.clone();
        self.execute(move |conn| {
            run_migrations(conn).map_err(|err| SinkError::Write(format!("{err:#}")))?;

            let tx = conn.transaction().map_err(write_err)?;
            tx.execute(
                "INSERT INTO patient_data (
                    patient_id,
                    time,
                    pulse_rate,
                    oxygen_saturation,
                    respiration_rate,
                    temperature,
                    ecg_rhythm,
                    health_status,
                    a0_value,
                    current_bpm
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    reading.patient_id,
                    format_time(&reading.timestamp),
                    reading.pulse_rate,
                    reading.oxygen_saturation,
                    reading.respiration_rate,
                    reading.temperature,
                    reading.ecg_rhythm.as_str(),
                    assessment.text,
                    reading.raw_amplitude,
                    reading.raw_bpm,
                ],
            )
            .map_err(write_err)?;
            let id = tx.last_insert_rowid();
            tx.commit().map_err(write_err)?;
            Ok(id)
        })
        .await
    }

    /// Newest records first.
    pub async fn fetch_recent_records(&self, limit: usize) -> Result<Vec<StoredRecord>, SinkError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let read_err = |err: anyhow::Error| SinkError::Read(format!("{err:#}"));

            let mut stmt = conn
                .prepare(
                    "SELECT id, patient_id, time, pulse_rate, oxygen_saturation,
                            respiration_rate, temperature, ecg_rhythm, health_status,
                            a0_value, current_bpm
                     FROM patient_data
                     ORDER BY time DESC, id DESC
                     LIMIT ?1",
                )
                .map_err(|err| read_err(err.into()))?;

            let mut rows = stmt.query(params![limit]).map_err(|err| read_err(err.into()))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next().map_err(|err| read_err(err.into()))? {
                records.push(row_to_record(row).map_err(read_err)?);
            }

            Ok(records)
        })
        .await
    }
}

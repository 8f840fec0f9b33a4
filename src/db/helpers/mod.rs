use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;

use crate::models::EcgRhythm;

/// Column format of `patient_data.time`.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_time(value: &NaiveDateTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

pub fn parse_time(value: &str, field: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_rhythm(value: &str) -> Result<EcgRhythm> {
    EcgRhythm::parse(value).ok_or_else(|| anyhow!("unknown ecg rhythm {value}"))
}

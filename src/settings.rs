use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::sensing::{serial::default_device, Bounds, SanityBounds, VitalProfile, VitalRanges};

pub const CONFIG_ENV: &str = "VITALWATCH_CONFIG";

const MAX_PULSE_JITTER: i32 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    #[default]
    Synthetic,
    Serial,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    pub mode: SourceMode,
    pub device: PathBuf,
    pub read_timeout_ms: u64,
    pub profile: VitalProfile,
    /// Overrides the profile's ranges when present.
    pub ranges: Option<VitalRanges>,
    pub pulse_jitter: i32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            mode: SourceMode::Synthetic,
            device: default_device(),
            read_timeout_ms: 2_000,
            profile: VitalProfile::Normal,
            ranges: None,
            pulse_jitter: 0,
        }
    }
}

impl SourceSettings {
    pub fn effective_ranges(&self) -> VitalRanges {
        self.ranges
            .clone()
            .unwrap_or_else(|| VitalRanges::for_profile(self.profile))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceSettings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".into(),
            model: "deepseek-r1:7b".into(),
            temperature: 0.3,
            request_timeout_secs: 120,
            system_prompt: "You are an experienced emergency physician. \
                Answer directly; do not wrap your reasoning in <think> tags."
                .into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("health_data.sqlite3"),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Pause after every cycle that reached the assessment step.
    pub interval_secs: u64,
    /// Pause after an empty read.
    pub empty_backoff_ms: u64,
    pub cycle_timeout_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            empty_backoff_ms: 1_000,
            cycle_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Also write log lines here, rotating by size.
    pub file: Option<PathBuf>,
    pub max_file_bytes: usize,
    /// Rotated files kept next to the live one.
    pub max_backups: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
            max_file_bytes: 1_000_000,
            max_backups: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub validation: SanityBounds,
    pub inference: InferenceSettings,
    pub database: DatabaseSettings,
    pub schedule: ScheduleSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Reads settings from `path`, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("VITALWATCH_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(url) = lookup("VITALWATCH_INFERENCE_URL") {
            self.inference.endpoint = url;
        }
        if let Some(model) = lookup("VITALWATCH_MODEL") {
            self.inference.model = model;
        }
        if let Some(device) = lookup("VITALWATCH_SERIAL_DEVICE") {
            self.source.device = PathBuf::from(device);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.interval_secs == 0 {
            bail!("schedule.interval_secs must be greater than zero");
        }
        if self.schedule.cycle_timeout_secs == 0 {
            bail!("schedule.cycle_timeout_secs must be greater than zero");
        }
        if self.source.read_timeout_ms == 0 {
            bail!("source.read_timeout_ms must be greater than zero");
        }
        if !(0..=MAX_PULSE_JITTER).contains(&self.source.pulse_jitter) {
            bail!("source.pulse_jitter must be between 0 and {MAX_PULSE_JITTER}");
        }
        if self.inference.request_timeout_secs == 0 {
            bail!("inference.request_timeout_secs must be greater than zero");
        }
        if !(0.0..=2.0).contains(&self.inference.temperature) {
            bail!("inference.temperature must be between 0 and 2");
        }
        if self.logging.file.is_some() && self.logging.max_file_bytes == 0 {
            bail!("logging.max_file_bytes must be greater than zero");
        }

        let ranges = self.source.effective_ranges();
        check_int_bounds("ranges.raw_amplitude", &ranges.raw_amplitude)?;
        check_int_bounds("ranges.pulse_rate", &ranges.pulse_rate)?;
        check_float_bounds("ranges.oxygen_saturation", &ranges.oxygen_saturation)?;
        check_int_bounds("ranges.respiration_rate", &ranges.respiration_rate)?;
        check_float_bounds("ranges.temperature", &ranges.temperature)?;

        let v = &self.validation;
        check_int_bounds("validation.pulse_rate", &v.pulse_rate)?;
        check_float_bounds("validation.oxygen_saturation", &v.oxygen_saturation)?;
        check_int_bounds("validation.respiration_rate", &v.respiration_rate)?;
        check_float_bounds("validation.temperature", &v.temperature)?;
        check_int_bounds("validation.raw_amplitude", &v.raw_amplitude)?;
        check_int_bounds("validation.raw_bpm", &v.raw_bpm)?;

        // A generated reading that can never pass validation would be retried forever.
        check_within("pulse_rate", &ranges.pulse_rate, &v.pulse_rate)?;
        check_within("pulse_rate", &ranges.pulse_rate, &v.raw_bpm)?;
        check_within("oxygen_saturation", &ranges.oxygen_saturation, &v.oxygen_saturation)?;
        check_within("respiration_rate", &ranges.respiration_rate, &v.respiration_rate)?;
        check_within("temperature", &ranges.temperature, &v.temperature)?;
        check_within("raw_amplitude", &ranges.raw_amplitude, &v.raw_amplitude)?;

        Ok(())
    }
}

fn check_within<T>(name: &str, range: &Bounds<T>, limits: &Bounds<T>) -> Result<()>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    if !range.within(limits) {
        bail!(
            "ranges.{name} [{}, {}] lies outside validation bounds [{}, {}]",
            range.min,
            range.max,
            limits.min,
            limits.max
        );
    }
    Ok(())
}

fn check_int_bounds(name: &str, bounds: &Bounds<i32>) -> Result<()> {
    if bounds.min > bounds.max {
        bail!("{name}: min {} exceeds max {}", bounds.min, bounds.max);
    }
    Ok(())
}

fn check_float_bounds(name: &str, bounds: &Bounds<f64>) -> Result<()> {
    if !bounds.min.is_finite() || !bounds.max.is_finite() {
        bail!("{name}: bounds must be finite");
    }
    if bounds.min > bounds.max {
        bail!("{name}: min {} exceeds max {}", bounds.min, bounds.max);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_reference_deployment() {
        let settings = Settings::default();
        assert_eq!(settings.schedule.interval_secs, 60);
        assert_eq!(settings.inference.model, "deepseek-r1:7b");
        assert_eq!(settings.source.mode, SourceMode::Synthetic);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitalwatch.json");
        fs::write(
            &path,
            r#"{ "source": { "mode": "serial", "profile": "raw_sensor" }, "schedule": { "interval_secs": 30 } }"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.source.mode, SourceMode::Serial);
        assert_eq!(settings.source.read_timeout_ms, 2_000);
        assert_eq!(settings.source.effective_ranges(), VitalRanges::raw_sensor());
        assert_eq!(settings.schedule.interval_secs, 30);
        assert_eq!(settings.schedule.empty_backoff_ms, 1_000);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.json"))).is_err());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("VITALWATCH_DB_PATH", "/var/lib/vitalwatch/records.sqlite3"),
            ("VITALWATCH_MODEL", "llama3:8b"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(
            settings.database.path,
            PathBuf::from("/var/lib/vitalwatch/records.sqlite3")
        );
        assert_eq!(settings.inference.model, "llama3:8b");
        assert_eq!(settings.source.device, default_device());
    }

    #[test]
    fn ranges_outside_validation_bounds_are_rejected() {
        let mut settings = Settings::default();
        let mut ranges = VitalRanges::normal();
        ranges.temperature = Bounds::new(46.0, 47.0);
        settings.source.ranges = Some(ranges);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.validation.pulse_rate = Bounds::new(0, 80);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn both_profiles_fit_default_validation_bounds() {
        let mut settings = Settings::default();
        settings.source.profile = VitalProfile::RawSensor;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut settings = Settings::default();
        settings.schedule.cycle_timeout_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.inference.request_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn pulse_jitter_is_bounded() {
        let mut settings = Settings::default();
        settings.source.pulse_jitter = 5;
        assert!(settings.validate().is_ok());

        for jitter in [-1, 51, i32::MIN] {
            settings.source.pulse_jitter = jitter;
            assert!(settings.validate().is_err(), "jitter {jitter} accepted");
        }
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let mut settings = Settings::default();
        let mut ranges = VitalRanges::normal();
        ranges.temperature = Bounds::new(38.0, 36.0);
        settings.source.ranges = Some(ranges);
        assert!(settings.validate().is_err());
    }
}

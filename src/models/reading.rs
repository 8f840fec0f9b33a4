//! Vital-sign reading data model.
//!
//! A `Reading` is one sampled observation. The raw sensor values are kept
//! next to the derived `pulse_rate` so the stored row can be audited later.

use std::fmt;

use chrono::{Local, NaiveDateTime, Timelike};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EcgRhythm {
    NormalSinusRhythm,
    AtrialFibrillation,
    VentricularTachycardia,
    Bradycardia,
    SupraventricularTachycardia,
}

impl EcgRhythm {
    pub const ALL: [EcgRhythm; 5] = [
        EcgRhythm::NormalSinusRhythm,
        EcgRhythm::AtrialFibrillation,
        EcgRhythm::VentricularTachycardia,
        EcgRhythm::Bradycardia,
        EcgRhythm::SupraventricularTachycardia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EcgRhythm::NormalSinusRhythm => "Normal Sinus Rhythm",
            EcgRhythm::AtrialFibrillation => "Atrial Fibrillation",
            EcgRhythm::VentricularTachycardia => "Ventricular Tachycardia",
            EcgRhythm::Bradycardia => "Bradycardia",
            EcgRhythm::SupraventricularTachycardia => "Supraventricular Tachycardia",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rhythm| rhythm.as_str() == value)
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        *Self::ALL
            .choose(rng)
            .unwrap_or(&EcgRhythm::NormalSinusRhythm)
    }
}

impl fmt::Display for EcgRhythm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Per-cycle session identifier, not a stable patient identity.
    pub patient_id: String,
    /// Wall-clock capture time, whole seconds.
    pub timestamp: NaiveDateTime,
    pub pulse_rate: i32,
    pub oxygen_saturation: f64,
    pub respiration_rate: i32,
    pub temperature: f64,
    pub ecg_rhythm: EcgRhythm,
    /// Unprocessed sensor amplitude (`a0_value`).
    pub raw_amplitude: i32,
    /// Sensor-derived heart rate (`current_bpm`).
    pub raw_bpm: i32,
}

/// `PT-####` identifier drawn fresh for every cycle.
pub fn new_patient_id<R: Rng>(rng: &mut R) -> String {
    format!("PT-{}", rng.gen_range(1000..=9999))
}

/// Local wall-clock time truncated to whole seconds.
pub fn capture_time() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn rhythm_labels_round_trip_through_parse() {
        for rhythm in EcgRhythm::ALL {
            assert_eq!(EcgRhythm::parse(rhythm.as_str()), Some(rhythm));
        }
        assert_eq!(EcgRhythm::parse("Sinus Arrest"), None);
    }

    #[test]
    fn patient_ids_use_four_digit_suffix() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let id = new_patient_id(&mut rng);
            let digits = id.strip_prefix("PT-").expect("PT- prefix");
            assert_eq!(digits.len(), 4);
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn capture_time_has_no_fractional_seconds() {
        assert_eq!(capture_time().nanosecond(), 0);
    }
}

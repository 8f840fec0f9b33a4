//! Value ranges for vital signs.
//!
//! `VitalRanges` drive synthetic generation; `SanityBounds` drive validation.
//! Both are plain configuration so deployments can pick or override a profile.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive `[min, max]` interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }

    /// True when every value of `self` also lies in `outer`.
    pub fn within(&self, outer: &Bounds<T>) -> bool {
        outer.min <= self.min && self.max <= outer.max
    }
}

impl Bounds<i32> {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> i32 {
        if self.min >= self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

impl Bounds<f64> {
    /// Uniform sample rounded to one decimal place.
    pub fn sample_tenths<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.min >= self.max {
            return round_tenths(self.min);
        }
        let value = round_tenths(rng.gen_range(self.min..=self.max));
        value.clamp(self.min, self.max)
    }
}

pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VitalProfile {
    /// Resting adult ranges.
    #[default]
    Normal,
    /// Wider ranges used alongside a hardware pulse sensor.
    RawSensor,
}

/// Generation ranges for synthetic vital fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalRanges {
    pub raw_amplitude: Bounds<i32>,
    pub pulse_rate: Bounds<i32>,
    pub oxygen_saturation: Bounds<f64>,
    pub respiration_rate: Bounds<i32>,
    pub temperature: Bounds<f64>,
}

impl VitalRanges {
    pub fn normal() -> Self {
        Self {
            raw_amplitude: Bounds::new(300, 700),
            pulse_rate: Bounds::new(60, 100),
            oxygen_saturation: Bounds::new(95.0, 100.0),
            respiration_rate: Bounds::new(12, 20),
            temperature: Bounds::new(36.0, 37.5),
        }
    }

    pub fn raw_sensor() -> Self {
        Self {
            raw_amplitude: Bounds::new(0, 1023),
            pulse_rate: Bounds::new(40, 180),
            oxygen_saturation: Bounds::new(88.0, 100.0),
            respiration_rate: Bounds::new(8, 30),
            temperature: Bounds::new(35.0, 39.5),
        }
    }

    pub fn for_profile(profile: VitalProfile) -> Self {
        match profile {
            VitalProfile::Normal => Self::normal(),
            VitalProfile::RawSensor => Self::raw_sensor(),
        }
    }
}

impl Default for VitalRanges {
    fn default() -> Self {
        Self::normal()
    }
}

/// Hard limits a reading must satisfy before it is sent for assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SanityBounds {
    pub pulse_rate: Bounds<i32>,
    pub oxygen_saturation: Bounds<f64>,
    pub respiration_rate: Bounds<i32>,
    pub temperature: Bounds<f64>,
    pub raw_amplitude: Bounds<i32>,
    pub raw_bpm: Bounds<i32>,
}

impl Default for SanityBounds {
    fn default() -> Self {
        Self {
            pulse_rate: Bounds::new(0, 300),
            oxygen_saturation: Bounds::new(0.0, 100.0),
            respiration_rate: Bounds::new(0, 100),
            temperature: Bounds::new(20.0, 45.0),
            // 12-bit ADC ceiling; 10-bit boards stay well inside it.
            raw_amplitude: Bounds::new(0, 4095),
            raw_bpm: Bounds::new(0, 300),
        }
    }
}

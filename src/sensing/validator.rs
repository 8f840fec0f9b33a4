use thiserror::Error;

use crate::models::Reading;

use super::ranges::{Bounds, SanityBounds};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} is empty")]
    Missing { field: &'static str },
    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },
}

/// Checks every field of a candidate reading against `bounds`.
///
/// Stops at the first offending field.
pub fn validate(reading: &Reading, bounds: &SanityBounds) -> Result<(), ValidationError> {
    if reading.patient_id.trim().is_empty() {
        return Err(ValidationError::Missing {
            field: "patient_id",
        });
    }

    check_int("pulse_rate", reading.pulse_rate, &bounds.pulse_rate)?;
    check_float(
        "oxygen_saturation",
        reading.oxygen_saturation,
        &bounds.oxygen_saturation,
    )?;
    check_int(
        "respiration_rate",
        reading.respiration_rate,
        &bounds.respiration_rate,
    )?;
    check_float("temperature", reading.temperature, &bounds.temperature)?;
    check_int("a0_value", reading.raw_amplitude, &bounds.raw_amplitude)?;
    check_int("current_bpm", reading.raw_bpm, &bounds.raw_bpm)?;

    Ok(())
}

fn check_int(field: &'static str, value: i32, bounds: &Bounds<i32>) -> Result<(), ValidationError> {
    // Sanity ranges never admit negatives, whatever the configuration says.
    if value < 0 || !bounds.contains(value) {
        return Err(ValidationError::OutOfRange {
            field,
            value: value.to_string(),
            min: bounds.min.max(0).to_string(),
            max: bounds.max.to_string(),
        });
    }
    Ok(())
}

fn check_float(
    field: &'static str,
    value: f64,
    bounds: &Bounds<f64>,
) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < 0.0 || !bounds.contains(value) {
        return Err(ValidationError::OutOfRange {
            field,
            value: value.to_string(),
            min: bounds.min.max(0.0).to_string(),
            max: bounds.max.to_string(),
        });
    }
    Ok(())
}

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    log_debug,
    models::{capture_time, new_patient_id, EcgRhythm, Reading},
    utils::LogContext,
};

use super::{ranges::VitalRanges, ReadingSource, SourceEvent};

/// Generates complete readings from configured ranges; never empty, never malformed.
pub struct SyntheticSource {
    ranges: VitalRanges,
    rng: StdRng,
    log: LogContext,
}

impl SyntheticSource {
    pub fn new(ranges: VitalRanges, log: LogContext) -> Self {
        Self::with_rng(ranges, StdRng::from_entropy(), log)
    }

    pub fn with_rng(ranges: VitalRanges, rng: StdRng, log: LogContext) -> Self {
        Self { ranges, rng, log }
    }

    pub fn generate(&mut self) -> Reading {
        let raw_amplitude = self.ranges.raw_amplitude.sample(&mut self.rng);
        let raw_bpm = self.ranges.pulse_rate.sample(&mut self.rng);
        synthesize_reading(&mut self.rng, &self.ranges, raw_amplitude, raw_bpm, raw_bpm)
    }
}

#[async_trait]
impl ReadingSource for SyntheticSource {
    async fn next_reading(&mut self) -> SourceEvent {
        let reading = self.generate();
        log_debug!(
            self.log,
            "generated reading: A0={}, BPM={}",
            reading.raw_amplitude,
            reading.raw_bpm
        );
        SourceEvent::Reading(reading)
    }
}

/// Builds a reading around the given signal values, drawing the other vitals from `ranges`.
pub(crate) fn synthesize_reading<R: Rng>(
    rng: &mut R,
    ranges: &VitalRanges,
    raw_amplitude: i32,
    raw_bpm: i32,
    pulse_rate: i32,
) -> Reading {
    Reading {
        patient_id: new_patient_id(rng),
        timestamp: capture_time(),
        pulse_rate,
        oxygen_saturation: ranges.oxygen_saturation.sample_tenths(rng),
        respiration_rate: ranges.respiration_rate.sample(rng),
        temperature: ranges.temperature.sample_tenths(rng),
        ecg_rhythm: EcgRhythm::random(rng),
        raw_amplitude,
        raw_bpm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::{validator::validate, ranges::SanityBounds};

    fn source(seed: u64, ranges: VitalRanges) -> SyntheticSource {
        SyntheticSource::with_rng(
            ranges,
            StdRng::seed_from_u64(seed),
            LogContext::silent("sensing"),
        )
    }

    #[tokio::test]
    async fn always_yields_a_reading_within_normal_ranges() {
        let ranges = VitalRanges::normal();
        let mut src = source(7, ranges.clone());

        for _ in 0..200 {
            let SourceEvent::Reading(reading) = src.next_reading().await else {
                panic!("synthetic source must always produce a reading");
            };
            assert!(ranges.pulse_rate.contains(reading.pulse_rate));
            assert!(ranges.raw_amplitude.contains(reading.raw_amplitude));
            assert!(ranges.oxygen_saturation.contains(reading.oxygen_saturation));
            assert!(ranges.respiration_rate.contains(reading.respiration_rate));
            assert!(ranges.temperature.contains(reading.temperature));
            assert_eq!(reading.pulse_rate, reading.raw_bpm);
            assert!(validate(&reading, &SanityBounds::default()).is_ok());
        }
    }

    #[test]
    fn synthesized_reading_keeps_given_signal_values() {
        let mut rng = StdRng::seed_from_u64(3);
        let reading = synthesize_reading(&mut rng, &VitalRanges::raw_sensor(), 450, 72, 75);
        assert_eq!(reading.raw_amplitude, 450);
        assert_eq!(reading.raw_bpm, 72);
        assert_eq!(reading.pulse_rate, 75);
        assert!(reading.patient_id.starts_with("PT-"));
    }
}

use std::time::Duration;

use uuid::Uuid;

use crate::{
    assessment::{AssessmentError, Assessor},
    db::{RecordStore, SinkError},
    log_debug, log_info, log_warn,
    sensing::{validate, ReadingSource, SanityBounds, SourceEvent, ValidationError},
    settings::ScheduleSettings,
    utils::LogContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Acquiring,
    Validating,
    Assessing,
    Persisting,
    Sleeping,
}

/// How a single cycle ended. The scheduler picks the next delay from this.
#[derive(Debug)]
pub enum CycleOutcome {
    SourceEmpty,
    SourceMalformed(String),
    ValidationFailed(ValidationError),
    AssessmentFailed(AssessmentError),
    Persisted { patient_id: String },
    PersistFailed(SinkError),
    /// Panic or timeout caught at the loop boundary.
    Unexpected(String),
}

impl CycleOutcome {
    pub fn next_delay(&self, timing: &CycleTiming) -> Duration {
        match self {
            CycleOutcome::SourceEmpty => timing.empty_backoff,
            // Pacing comes from the source's own read timeout, see `Pipeline::next_delay`.
            CycleOutcome::SourceMalformed(_) | CycleOutcome::ValidationFailed(_) => Duration::ZERO,
            CycleOutcome::AssessmentFailed(_)
            | CycleOutcome::Persisted { .. }
            | CycleOutcome::PersistFailed(_)
            | CycleOutcome::Unexpected(_) => timing.interval,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::SourceEmpty => "source empty",
            CycleOutcome::SourceMalformed(_) => "malformed input",
            CycleOutcome::ValidationFailed(_) => "validation failed",
            CycleOutcome::AssessmentFailed(_) => "no assessment",
            CycleOutcome::Persisted { .. } => "persisted",
            CycleOutcome::PersistFailed(_) => "persist failed",
            CycleOutcome::Unexpected(_) => "unexpected failure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleTiming {
    pub interval: Duration,
    pub empty_backoff: Duration,
    pub cycle_timeout: Duration,
}

impl From<&ScheduleSettings> for CycleTiming {
    fn from(settings: &ScheduleSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.interval_secs),
            empty_backoff: Duration::from_millis(settings.empty_backoff_ms),
            cycle_timeout: Duration::from_secs(settings.cycle_timeout_secs),
        }
    }
}

/// Source, assessor and sink wired into one acquire/validate/assess/persist cycle.
pub struct Pipeline<S, A, K> {
    source: S,
    assessor: A,
    sink: K,
    bounds: SanityBounds,
    state: PipelineState,
    log: LogContext,
}

impl<S, A, K> Pipeline<S, A, K>
where
    S: ReadingSource,
    A: Assessor,
    K: RecordStore,
{
    pub fn new(source: S, assessor: A, sink: K, bounds: SanityBounds, log: LogContext) -> Self {
        Self {
            source,
            assessor,
            sink,
            bounds,
            state: PipelineState::Idle,
            log,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Delay before the next cycle. Immediate retries fall back to the empty-read
    /// backoff when the source does not wait on input itself.
    pub fn next_delay(&self, outcome: &CycleOutcome, timing: &CycleTiming) -> Duration {
        let delay = outcome.next_delay(timing);
        if delay.is_zero() && !self.source.self_paced() {
            timing.empty_backoff
        } else {
            delay
        }
    }

    /// Runs one cycle. Every failure is resolved here into a [`CycleOutcome`].
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let cycle_id = Uuid::new_v4();
        self.transition(PipelineState::Acquiring);

        let reading = match self.source.next_reading().await {
            SourceEvent::Reading(reading) => reading,
            SourceEvent::Empty => {
                log_debug!(self.log, "[{cycle_id}] source had no data");
                self.transition(PipelineState::Sleeping);
                return CycleOutcome::SourceEmpty;
            }
            SourceEvent::Malformed(line) => {
                log_warn!(self.log, "[{cycle_id}] skipping malformed input {line:?}");
                self.transition(PipelineState::Idle);
                return CycleOutcome::SourceMalformed(line);
            }
        };

        self.transition(PipelineState::Validating);
        if let Err(err) = validate(&reading, &self.bounds) {
            log_warn!(self.log, "[{cycle_id}] discarding reading {}: {err}", reading.patient_id);
            self.transition(PipelineState::Idle);
            return CycleOutcome::ValidationFailed(err);
        }
        log_info!(
            self.log,
            "[{cycle_id}] reading {}: pulse={} spo2={:.1} resp={} temp={:.1} rhythm={} A0={} BPM={}",
            reading.patient_id,
            reading.pulse_rate,
            reading.oxygen_saturation,
            reading.respiration_rate,
            reading.temperature,
            reading.ecg_rhythm,
            reading.raw_amplitude,
            reading.raw_bpm
        );

        self.transition(PipelineState::Assessing);
        let assessment = match self.assessor.assess(&reading).await {
            Ok(assessment) => assessment,
            Err(err) => {
                log_warn!(
                    self.log,
                    "[{cycle_id}] no assessment for {} ({:?}): {err}",
                    reading.patient_id,
                    err.kind()
                );
                self.transition(PipelineState::Sleeping);
                return CycleOutcome::AssessmentFailed(err);
            }
        };
        log_info!(self.log, "[{cycle_id}] assessment: {}", assessment.text);

        self.transition(PipelineState::Persisting);
        let outcome = match self.sink.persist(&reading, &assessment).await {
            Ok(()) => CycleOutcome::Persisted {
                patient_id: reading.patient_id,
            },
            Err(err) => CycleOutcome::PersistFailed(err),
        };

        self.transition(PipelineState::Sleeping);
        outcome
    }

    /// Marks the start of the inter-cycle pause, whatever state the last cycle left behind.
    pub(crate) fn enter_sleep(&mut self) {
        self.transition(PipelineState::Sleeping);
    }

    pub(crate) fn wake(&mut self) {
        self.transition(PipelineState::Idle);
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            log_debug!(self.log, "state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

//! In-memory stand-ins for the pipeline's source, assessor and sink.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;

use crate::{
    assessment::{AssessmentError, Assessor},
    db::{RecordStore, SinkError},
    models::{Assessment, EcgRhythm, Reading},
    sensing::{ReadingSource, SourceEvent},
};

pub fn sample_reading() -> Reading {
    Reading {
        patient_id: "PT-4321".into(),
        timestamp: NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|d| d.and_hms_opt(9, 26, 53))
            .unwrap(),
        pulse_rate: 72,
        oxygen_saturation: 98.2,
        respiration_rate: 16,
        temperature: 36.8,
        ecg_rhythm: EcgRhythm::NormalSinusRhythm,
        raw_amplitude: 512,
        raw_bpm: 72,
    }
}

/// Replays scripted events, then repeats `fallback` (or reports empty).
pub struct StubSource {
    events: VecDeque<SourceEvent>,
    fallback: Option<Reading>,
    panics: usize,
    paced: bool,
}

impl StubSource {
    pub fn scripted(events: Vec<SourceEvent>) -> Self {
        Self {
            events: events.into(),
            fallback: None,
            panics: 0,
            paced: false,
        }
    }

    pub fn repeating(reading: Reading) -> Self {
        Self {
            fallback: Some(reading),
            ..Self::scripted(Vec::new())
        }
    }

    /// Panics on the first `count` calls before producing anything.
    pub fn panicking(mut self, count: usize) -> Self {
        self.panics = count;
        self
    }

    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }
}

#[async_trait]
impl ReadingSource for StubSource {
    async fn next_reading(&mut self) -> SourceEvent {
        if self.panics > 0 {
            self.panics -= 1;
            panic!("sensor driver exploded");
        }
        match self.events.pop_front() {
            Some(event) => event,
            None => self
                .fallback
                .clone()
                .map_or(SourceEvent::Empty, SourceEvent::Reading),
        }
    }

    fn self_paced(&self) -> bool {
        self.paced
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Echo(String),
    FailNetwork,
    Panic,
    Stall(Duration),
}

/// Plays scripted behaviors in order, then falls back to echoing `default_text`.
#[derive(Clone)]
pub struct ScriptedAssessor {
    script: Arc<Mutex<VecDeque<Behavior>>>,
    default_text: String,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAssessor {
    pub fn echo(text: &str) -> Self {
        Self::with_default(Vec::new(), text)
    }

    pub fn scripted(script: Vec<Behavior>) -> Self {
        Self::with_default(script, "Stable.")
    }

    pub fn with_default(script: Vec<Behavior>, text: &str) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            default_text: text.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Assessor for ScriptedAssessor {
    async fn assess(&self, _reading: &Reading) -> Result<Assessment, AssessmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next.unwrap_or_else(|| Behavior::Echo(self.default_text.clone())) {
            Behavior::Echo(text) => Ok(Assessment::new(text)),
            Behavior::FailNetwork => Err(AssessmentError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "model loading".into(),
            }),
            Behavior::Panic => panic!("assessor exploded"),
            Behavior::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(Assessment::new(self.default_text.clone()))
            }
        }
    }
}

/// Records what it is asked to persist. `failing()` rejects every write;
/// `panicking(n)` panics on the first `n` writes.
#[derive(Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(Reading, Assessment)>>>,
    attempts: Arc<AtomicUsize>,
    panics_left: Arc<AtomicUsize>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            panics_left: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn panicking(count: usize) -> Self {
        let sink = Self::new();
        sink.panics_left.store(count, Ordering::SeqCst);
        sink
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<(Reading, Assessment)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemorySink {
    async fn persist(&self, reading: &Reading, assessment: &Assessment) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let panic_now = self
            .panics_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if panic_now {
            panic!("storage driver exploded");
        }
        if self.fail {
            return Err(SinkError::Write("disk full".into()));
        }
        self.records
            .lock()
            .unwrap()
            .push((reading.clone(), assessment.clone()));
        Ok(())
    }
}

/// Polls `condition` until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

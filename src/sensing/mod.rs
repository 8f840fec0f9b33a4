//! Reading acquisition: sources, the sensor line protocol and validation.

pub mod protocol;
pub mod ranges;
pub mod serial;
pub mod synthetic;
pub mod validator;

use anyhow::Result;
use async_trait::async_trait;
use tokio::{fs::File, time::Duration};

use crate::{
    models::Reading,
    settings::{SourceMode, SourceSettings},
    utils::LogContext,
};

pub use ranges::{Bounds, SanityBounds, VitalProfile, VitalRanges};
pub use serial::{SerialOptions, SerialSource};
pub use synthetic::SyntheticSource;
pub use validator::{validate, ValidationError};

/// Result of asking a source for its next sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Reading(Reading),
    /// Nothing to report yet. Benign.
    Empty,
    /// The source produced input it could not decode.
    Malformed(String),
}

/// Capability shared by every reading source: produce one candidate per call.
#[async_trait]
pub trait ReadingSource: Send {
    async fn next_reading(&mut self) -> SourceEvent;

    /// True when `next_reading` waits on input, so back-to-back calls cannot spin.
    fn self_paced(&self) -> bool {
        false
    }
}

/// Source variant picked once at startup from settings.
pub enum SourceKind {
    Synthetic(SyntheticSource),
    Serial(SerialSource<File>),
}

impl SourceKind {
    pub async fn from_settings(settings: &SourceSettings, log: LogContext) -> Result<Self> {
        let ranges = settings.effective_ranges();
        match settings.mode {
            SourceMode::Synthetic => Ok(SourceKind::Synthetic(SyntheticSource::new(ranges, log))),
            SourceMode::Serial => {
                let options = SerialOptions {
                    read_timeout: Duration::from_millis(settings.read_timeout_ms),
                    ranges,
                    pulse_jitter: settings.pulse_jitter,
                };
                let source = SerialSource::open(&settings.device, options, log).await?;
                Ok(SourceKind::Serial(source))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Synthetic(_) => "synthetic",
            SourceKind::Serial(_) => "serial",
        }
    }
}

#[async_trait]
impl ReadingSource for SourceKind {
    async fn next_reading(&mut self) -> SourceEvent {
        match self {
            SourceKind::Synthetic(source) => source.next_reading().await,
            SourceKind::Serial(source) => source.next_reading().await,
        }
    }

    fn self_paced(&self) -> bool {
        match self {
            SourceKind::Synthetic(source) => source.self_paced(),
            SourceKind::Serial(source) => source.self_paced(),
        }
    }
}

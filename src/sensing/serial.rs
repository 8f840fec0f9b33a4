use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    time::{timeout, Duration},
};

use crate::{log_debug, log_error, log_info, log_warn, utils::LogContext};

use super::{
    protocol::{decode_bytes, SensorLine},
    ranges::VitalRanges,
    synthetic::synthesize_reading,
    ReadingSource, SourceEvent,
};

#[derive(Debug, Clone)]
pub struct SerialOptions {
    pub read_timeout: Duration,
    pub ranges: VitalRanges,
    /// Uniform +/- jitter applied to `pulse_rate`; the raw bpm is kept as read.
    pub pulse_jitter: i32,
}

/// Longest accepted sensor line, newline included. `amplitude,bpm` needs far less.
pub const MAX_LINE_BYTES: usize = 256;

enum LineRead {
    Line(Vec<u8>),
    /// No newline within `MAX_LINE_BYTES`; the bytes were discarded.
    Overflow(Vec<u8>),
    Pending,
    Eof,
    Failed(io::Error),
}

/// Reads `amplitude,bpm` lines from a sensor byte stream.
///
/// The stream is held for the life of the source and only ever read.
pub struct SerialSource<R> {
    reader: BufReader<R>,
    /// Bytes of a line whose newline has not arrived yet. Survives read timeouts.
    pending: Vec<u8>,
    options: SerialOptions,
    rng: StdRng,
    log: LogContext,
}

impl SerialSource<File> {
    pub async fn open(path: &Path, options: SerialOptions, log: LogContext) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open serial device {}", path.display()))?;
        log_info!(log, "serial device {} opened", path.display());
        Ok(Self::new(file, options, log))
    }
}

impl<R: AsyncRead + Unpin + Send> SerialSource<R> {
    pub fn new(stream: R, options: SerialOptions, log: LogContext) -> Self {
        Self {
            reader: BufReader::new(stream),
            pending: Vec::new(),
            options,
            rng: StdRng::from_entropy(),
            log,
        }
    }

    async fn read_line(&mut self) -> LineRead {
        // `pending` never exceeds the cap, so at least one byte may still be read.
        let remaining = (MAX_LINE_BYTES + 1).saturating_sub(self.pending.len()) as u64;
        let mut limited = (&mut self.reader).take(remaining);
        let read = limited.read_until(b'\n', &mut self.pending);
        let result = timeout(self.options.read_timeout, read).await;
        match result {
            Err(_) => LineRead::Pending,
            Ok(Ok(0)) if self.pending.is_empty() => LineRead::Eof,
            Ok(Ok(_)) if self.pending.len() > MAX_LINE_BYTES && !self.pending.ends_with(b"\n") => {
                LineRead::Overflow(std::mem::take(&mut self.pending))
            }
            Ok(Ok(_)) => LineRead::Line(std::mem::take(&mut self.pending)),
            Ok(Err(err)) => LineRead::Failed(err),
        }
    }

    fn jittered_pulse(&mut self, bpm: i32) -> i32 {
        let jitter = self.options.pulse_jitter.saturating_abs();
        if jitter == 0 {
            return bpm;
        }
        bpm.saturating_add(self.rng.gen_range(-jitter..=jitter)).max(0)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ReadingSource for SerialSource<R> {
    async fn next_reading(&mut self) -> SourceEvent {
        let bytes = match self.read_line().await {
            LineRead::Line(bytes) => bytes,
            LineRead::Overflow(bytes) => {
                let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(32)]).into_owned();
                log_warn!(
                    self.log,
                    "sensor line exceeds {MAX_LINE_BYTES} bytes without a newline, discarding"
                );
                return SourceEvent::Malformed(preview);
            }
            LineRead::Pending => {
                log_debug!(self.log, "no complete sensor line within {:?}", self.options.read_timeout);
                return SourceEvent::Empty;
            }
            LineRead::Eof => {
                log_debug!(self.log, "sensor stream at end of input");
                return SourceEvent::Empty;
            }
            LineRead::Failed(err) => {
                log_error!(self.log, "sensor stream read failed: {err}");
                return SourceEvent::Empty;
            }
        };

        match decode_bytes(&bytes) {
            SensorLine::Sample { amplitude, bpm } => {
                log_info!(self.log, "sensor sample: A0={amplitude}, BPM={bpm}");
                let pulse_rate = self.jittered_pulse(bpm);
                let reading = synthesize_reading(
                    &mut self.rng,
                    &self.options.ranges,
                    amplitude,
                    bpm,
                    pulse_rate,
                );
                SourceEvent::Reading(reading)
            }
            SensorLine::Disconnected => {
                log_info!(self.log, "sensor reports leads off");
                SourceEvent::Empty
            }
            SensorLine::Malformed(line) => {
                log_warn!(self.log, "malformed sensor line: {line:?}");
                SourceEvent::Malformed(line)
            }
        }
    }

    fn self_paced(&self) -> bool {
        true
    }
}

pub fn default_device() -> PathBuf {
    PathBuf::from("/dev/ttyUSB0")
}

//! Logging setup and per-component logging contexts.
//!
//! The backend is initialised once at process start via [`Logging::init`].
//! Each component receives a [`LogContext`] at construction and logs through
//! the macros below, which route to the `log` facade under the context's
//! target and skip the call entirely when the context is disabled.
//!
//! Usage:
//! ```ignore
//! let logging = Logging::init(&settings.logging)?;
//! let log = logging.context("sensing");
//!
//! use crate::log_info;
//! log_info!(log, "reading acquired: {}", reading.patient_id);
//! ```

use std::{
    io::{self, Write},
    path::Path,
};

use anyhow::{Context, Result};
use env_logger::{Builder, Target};
use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use log::LevelFilter;

use crate::settings::LoggingSettings;

/// Handle for the process-wide logger.
///
/// Created once in `run`, flushed by [`Logging::shutdown`].
pub struct Logging {
    enabled: bool,
}

impl Logging {
    pub fn init(settings: &LoggingSettings) -> Result<Self> {
        let level = parse_level(&settings.level)?;

        let mut builder = Builder::new();
        builder.filter_level(level).parse_default_env();

        if let Some(path) = settings.file.as_deref() {
            let file = open_rotating_file(path, settings.max_file_bytes, settings.max_backups)?;
            builder.target(Target::Pipe(Box::new(ConsoleAndFile { file })));
        }

        // A second init (tests, embedding) keeps the logger that is already installed.
        let _ = builder.try_init();

        Ok(Self { enabled: true })
    }

    /// A handle that hands out silenced contexts. Used by tests.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn context(&self, target: &'static str) -> LogContext {
        LogContext {
            target,
            enabled: self.enabled,
        }
    }

    pub fn shutdown(self) {
        log::logger().flush();
    }
}

/// Target name plus on/off switch carried by every component.
#[derive(Debug, Clone, Copy)]
pub struct LogContext {
    target: &'static str,
    enabled: bool,
}

impl LogContext {
    pub fn silent(target: &'static str) -> Self {
        Self {
            target,
            enabled: false,
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

fn parse_level(value: &str) -> Result<LevelFilter> {
    value
        .parse::<LevelFilter>()
        .with_context(|| format!("invalid log level '{value}'"))
}

/// Log file that rolls over to `<name>.1 .. <name>.<max_backups>` once it reaches `max_bytes`.
fn open_rotating_file(
    path: &Path,
    max_bytes: usize,
    max_backups: usize,
) -> Result<FileRotate<AppendCount>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create log directory {}", parent.display())
        })?;
    }

    Ok(FileRotate::new(
        path,
        AppendCount::new(max_backups),
        ContentLimit::Bytes(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

/// Sends every formatted record to stderr and to the rotating file.
struct ConsoleAndFile {
    file: FileRotate<AppendCount>,
}

impl Write for ConsoleAndFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A closed stderr must not stop file logging.
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

/// Info-level log through a [`LogContext`].
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)*) => {
        if $ctx.enabled() {
            log::info!(target: $ctx.target(), $($arg)*);
        }
    };
}

/// Warn-level log through a [`LogContext`].
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)*) => {
        if $ctx.enabled() {
            log::warn!(target: $ctx.target(), $($arg)*);
        }
    };
}

/// Error-level log through a [`LogContext`].
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)*) => {
        if $ctx.enabled() {
            log::error!(target: $ctx.target(), $($arg)*);
        }
    };
}

/// Debug-level log through a [`LogContext`].
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)*) => {
        if $ctx.enabled() {
            log::debug!(target: $ctx.target(), $($arg)*);
        }
    };
}

//! Thread-safe asynchronous logger implementation.
//!
//! This module provides the main [`Logger`] interface. Messages are
//! filtered on the calling thread and formatted output is written by a
//! single background thread.

use crate::error::Result;
use crate::log_level::LogLevel;
use crate::log_message::LogMessage;
use crate::log_writer::{LogSink, spawn_writer_thread};
use std::path::PathBuf;
use std::sync::mpsc::{Sender, channel};

/// Thread-safe, non-blocking logger.
///
/// Cloneable instances share the same channel to a dedicated writer thread.
/// A logger built with [`Logger::discard`] has no writer at all and costs
/// one comparison per call.
///
/// # Examples
///
/// ```
/// use logging::{Logger, LogLevel};
///
/// let dir = std::env::temp_dir().join("logging-doc.log");
/// let logger = Logger::new(dir, LogLevel::Info).unwrap();
/// logger.info("Transport opened");
/// let ice = logger.for_component("ICE");
/// ice.debug("suppressed below Info");
/// ```
#[derive(Clone)]
pub struct Logger {
    sender: Option<Sender<LogMessage>>,
    level: LogLevel,
    component: Option<String>,
    console_output: bool,
}

impl Logger {
    /// Creates a new logger writing to a file.
    ///
    /// # Arguments
    ///
    /// * `log_path` - Path to log file (created if it doesn't exist)
    /// * `level` - Minimum log level to record
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn new(log_path: PathBuf, level: LogLevel) -> Result<Self> {
        Self::with_sink(LogSink::file(&log_path)?, level, None, false)
    }

    /// Creates a file logger tagged with a component and optionally echoing to stdout.
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn with_component(
        log_path: PathBuf,
        level: LogLevel,
        component: String,
        console_output: bool,
    ) -> Result<Self> {
        Self::with_sink(
            LogSink::file(&log_path)?,
            level,
            Some(component),
            console_output,
        )
    }

    /// Creates a logger whose writer thread prints to stderr.
    ///
    /// # Errors
    ///
    /// Returns error if the writer thread cannot be spawned.
    pub fn stderr(level: LogLevel) -> Result<Self> {
        Self::with_sink(LogSink::Stderr, level, None, false)
    }

    /// Logger that records nothing.
    pub fn discard() -> Self {
        Logger {
            sender: None,
            level: LogLevel::Error,
            component: None,
            console_output: false,
        }
    }

    fn with_sink(
        sink: LogSink,
        level: LogLevel,
        component: Option<String>,
        console_output: bool,
    ) -> Result<Self> {
        let (sender, receiver) = channel();
        spawn_writer_thread(sink, receiver)?;
        Ok(Logger {
            sender: Some(sender),
            level,
            component,
            console_output,
        })
    }

    /// Returns a logger tagged with another component that feeds the same writer.
    ///
    /// # Examples
    ///
    /// ```
    /// use logging::Logger;
    ///
    /// let main_logger = Logger::discard();
    /// let dtls_logger = main_logger.for_component("DTLS");
    /// assert_eq!(dtls_logger.component(), Some("DTLS"));
    /// ```
    pub fn for_component(&self, component: &str) -> Self {
        Logger {
            sender: self.sender.clone(),
            level: self.level,
            component: Some(component.to_string()),
            console_output: self.console_output,
        }
    }

    /// Component this logger tags messages with.
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    /// Whether a message at `level` would be recorded.
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.sender.is_some() && level >= self.level
    }

    /// Logs a trace message (only if level is Trace).
    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    /// Logs a debug message (only if level is Debug or lower).
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Logs an info message (only if level is Info or lower).
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Logs a warning message (only if level is Warn or lower).
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs an error message (always recorded unless discarding).
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Filters by level and sends message to writer thread.
    fn log(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        let Some(ref sender) = self.sender else {
            return;
        };

        let msg = LogMessage::new(level, self.component.clone(), message.to_string());
        if self.console_output {
            print!("{}", msg.format());
        }
        let _ = sender.send(msg);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("component", &self.component)
            .field("active", &self.sender.is_some())
            .finish()
    }
}

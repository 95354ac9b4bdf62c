//! Asynchronous log writer.

use crate::error::Result;
use crate::log_message::LogMessage;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::Receiver;

/// Destination drained by the writer thread.
pub(crate) enum LogSink {
    File(std::fs::File),
    Stderr,
}

impl LogSink {
    /// Opens or creates the file in append mode.
    pub fn file(log_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        Ok(LogSink::File(file))
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            LogSink::File(file) => {
                file.write_all(line.as_bytes())?;
                file.flush()
            }
            LogSink::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(line.as_bytes())?;
                err.flush()
            }
        }
    }
}

/// Manages log writing in a dedicated thread.
pub(crate) struct LogWriter {
    sink: LogSink,
}

impl LogWriter {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }

    fn write_message(&mut self, message: &LogMessage) {
        if let Err(e) = self.sink.write_line(&message.format()) {
            eprintln!("Error writing log: {}", e);
        }
    }

    /// Runs the writer loop until every sender is dropped.
    pub fn run(mut self, receiver: Receiver<LogMessage>) {
        for message in receiver {
            self.write_message(&message);
        }
    }
}

/// Spawns a dedicated log writer thread.
pub(crate) fn spawn_writer_thread(sink: LogSink, receiver: Receiver<LogMessage>) -> Result<()> {
    let writer = LogWriter::new(sink);
    std::thread::Builder::new()
        .name("log-writer".to_string())
        .spawn(move || writer.run(receiver))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_level::LogLevel;
    use std::fs;
    use std::sync::mpsc::channel;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_file_sink_creates_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        assert!(LogSink::file(&log_path).is_ok());
        assert!(log_path.exists());
    }

    #[test]
    fn test_file_sink_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("missing").join("test.log");
        assert!(LogSink::file(&log_path).is_err());
    }

    #[test]
    fn test_write_message() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let mut writer = LogWriter::new(LogSink::file(&log_path).unwrap());
        writer.write_message(&LogMessage::new(
            LogLevel::Info,
            None,
            "Test message".to_string(),
        ));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("INFO"));
        assert!(content.contains("Test message"));
    }

    #[test]
    fn test_spawn_writer_thread() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");
        let (sender, receiver) = channel();

        spawn_writer_thread(LogSink::file(&log_path).unwrap(), receiver).unwrap();

        sender
            .send(LogMessage::new(
                LogLevel::Debug,
                None,
                "Thread test".to_string(),
            ))
            .unwrap();
        drop(sender);

        thread::sleep(Duration::from_millis(100));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Thread test"));
    }
}

//! Internal log message structure.

use crate::log_level::LogLevel;
use chrono::Local;

/// Internal representation of a log message.
#[derive(Debug, Clone)]
pub(crate) struct LogMessage {
    pub timestamp: String,
    pub level: LogLevel,
    pub component: Option<String>,
    pub thread: Option<String>,
    pub message: String,
}

impl LogMessage {
    /// Creates a new log message stamped with the current local time and
    /// the name of the calling thread.
    pub fn new(level: LogLevel, component: Option<String>, message: String) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level,
            component,
            thread: std::thread::current().name().map(str::to_string),
            message,
        }
    }

    /// Formats message for output: `[timestamp] LEVEL <thread> [component: X]: message\n`
    pub fn format(&self) -> String {
        let mut line = format!("[{}] {}", self.timestamp, self.level.as_str());
        if let Some(ref thread) = self.thread {
            line.push_str(&format!(" <{}>", thread));
        }
        if let Some(ref component) = self.component {
            line.push_str(&format!(" [component: {}]", component));
        }
        line.push_str(&format!(": {}\n", self.message));
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_message_format_without_component() {
        let msg = LogMessage::new(LogLevel::Error, None, "Connection failed".to_string());
        let formatted = msg.format();

        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("Connection failed"));
        assert!(!formatted.contains("[component:"));
        assert!(formatted.ends_with('\n'));
    }

    #[test]
    fn test_log_message_format_with_component() {
        let msg = LogMessage::new(
            LogLevel::Debug,
            Some("ICE".to_string()),
            "binding request".to_string(),
        );
        assert!(msg.format().contains("[component: ICE]: binding request"));
    }

    #[test]
    fn test_thread_name_is_recorded() {
        let handle = std::thread::Builder::new()
            .name("media-reader-1".to_string())
            .spawn(|| LogMessage::new(LogLevel::Info, None, "x".to_string()))
            .unwrap();
        let msg = handle.join().unwrap();
        assert_eq!(msg.thread.as_deref(), Some("media-reader-1"));
        assert!(msg.format().contains("<media-reader-1>"));
    }

    #[test]
    fn test_timestamp_format() {
        let msg = LogMessage::new(LogLevel::Info, None, "Test".to_string());
        let ts = &msg.timestamp;

        // YYYY-MM-DD HH:MM:SS.mmm
        assert!(ts.len() >= 23);
        assert!(ts.contains('-'));
        assert!(ts.contains(':'));
        assert!(ts.contains('.'));
    }
}

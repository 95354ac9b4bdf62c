//! Thread-safe asynchronous logging library.
//!
//! Every [`Logger`] clone feeds the same writer thread, so reader threads,
//! signaling callers and the handshake can all log without contention on
//! the output file.

pub mod error;
mod log_level;
mod log_message;
mod log_writer;
mod logger;

pub use error::{LoggingError, Result};
pub use log_level::LogLevel;
pub use logger::Logger;

//! Query log sinks

use std::fmt::Debug;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use tracing::{Level, debug, error, info, trace, warn};

/// Receives one entry per timed statement
pub trait QueryLogSink: Send + Sync + Debug {
    fn log(&self, duration: Duration, query: &str);
}

/// Backend selection for the process-wide query logger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryLogBackend {
    /// Plain lines on stdout, interleaved with command output
    Writer,
    /// Plain lines on stderr
    #[default]
    Stderr,
    /// Structured `tracing` event at INFO
    Tracing,
    /// Structured `tracing` event at the configured level
    Leveled,
    Disabled,
}

/// Writes `QueryLog [<duration>] <query>` lines
pub struct WriterSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl Debug for WriterSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

impl QueryLogSink for WriterSink {
    fn log(&self, duration: Duration, query: &str) {
        let line = format!("QueryLog [{:?}] {}\n", duration, query);

        let Ok(mut writer) = self.writer.lock() else {
            return;
        };

        if let Err(e) = writer.write_all(line.as_bytes()) {
            warn!(error = %e, "Failed to write query log line");
        }
    }
}

/// Emits a structured `QueryLog` event at INFO
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl QueryLogSink for TracingSink {
    fn log(&self, duration: Duration, query: &str) {
        info!(duration_ms = duration.as_secs_f64() * 1000.0, query, "QueryLog");
    }
}

/// Emits a structured `QueryLog` event at a fixed level
#[derive(Debug, Clone, Copy)]
pub struct LeveledSink {
    level: Level,
}

impl LeveledSink {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl QueryLogSink for LeveledSink {
    fn log(&self, duration: Duration, query: &str) {
        let duration_ms = duration.as_secs_f64() * 1000.0;

        match self.level {
            Level::TRACE => trace!(duration_ms, query, "QueryLog"),
            Level::DEBUG => debug!(duration_ms, query, "QueryLog"),
            Level::INFO => info!(duration_ms, query, "QueryLog"),
            Level::WARN => warn!(duration_ms, query, "QueryLog"),
            _ => error!(duration_ms, query, "QueryLog"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_sink_line_format() {
        let buffer = SharedBuffer::default();
        let sink = WriterSink::new(buffer.clone());

        sink.log(Duration::from_micros(1500), "SELECT * FROM users WHERE id = $1");

        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "QueryLog [1.5ms] SELECT * FROM users WHERE id = $1\n");
    }

    #[test]
    fn test_leveled_sink_keeps_level() {
        let sink = LeveledSink::new(Level::WARN);
        assert_eq!(sink.level(), Level::WARN);

        sink.log(Duration::from_millis(3), "SELECT 1");
    }

    #[test]
    fn test_backend_deserialize() {
        let backend: QueryLogBackend = serde_json::from_str("\"leveled\"").unwrap();
        assert_eq!(backend, QueryLogBackend::Leveled);
        assert_eq!(QueryLogBackend::default(), QueryLogBackend::Stderr);
    }
}

//! Query logging driver decorator and its sinks

mod instrumented;
mod sink;

use std::sync::Arc;
use std::time::Duration;

use tracing::Level;

pub use instrumented::{InstrumentedConnection, InstrumentedDriver, InstrumentedStatement, QueryLogger};
pub use sink::{LeveledSink, QueryLogBackend, QueryLogSink, TracingSink, WriterSink};

#[cfg(test)]
pub use sink::mock::CaptureSink;

impl QueryLogger {
    /// Builds the logger for a configured backend
    pub fn from_backend(backend: QueryLogBackend, level: Level, min_duration: Duration) -> Self {
        let sink: Arc<dyn QueryLogSink> = match backend {
            QueryLogBackend::Writer => Arc::new(WriterSink::stdout()),
            QueryLogBackend::Stderr => Arc::new(WriterSink::stderr()),
            QueryLogBackend::Tracing => Arc::new(TracingSink),
            QueryLogBackend::Leveled => Arc::new(LeveledSink::new(level)),
            QueryLogBackend::Disabled => return Self::disabled(),
        };

        Self::new(sink, min_duration)
    }
}

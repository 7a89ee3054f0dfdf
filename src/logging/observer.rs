//! In-memory capture of emitted records, for tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value as Json;

use crate::logging::level::Level;
use crate::logging::logger::{Logger, LoggerBuilder};
use crate::logging::sink::Sink;

/// Shared buffer that accumulates everything written to it.
#[derive(Clone, Default)]
pub(crate) struct ObservedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl ObservedLogs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A sink writing into this buffer.
    pub(crate) fn sink(&self) -> Sink {
        Sink::writer("observer", self.clone())
    }

    /// Raw text written so far.
    pub(crate) fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// One entry per record (console stack traces span extra lines).
    pub(crate) fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Records parsed as JSON; lines that are not JSON objects are skipped.
    pub(crate) fn entries(&self) -> Vec<Json> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str::<Json>(line).ok())
            .filter(Json::is_object)
            .collect()
    }

    /// JSON records whose message equals `msg`.
    pub(crate) fn with_message(&self, msg: &str) -> Vec<Json> {
        self.entries()
            .into_iter()
            .filter(|e| e["msg"] == msg || e["M"] == msg)
            .collect()
    }

    /// JSON records at `level`.
    pub(crate) fn at_level(&self, level: Level) -> Vec<Json> {
        let name = level.as_capital_str();
        self.entries()
            .into_iter()
            .filter(|e| e["level"] == name || e["L"] == name)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for ObservedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A production JSON logger at `level` whose records land in the returned buffer.
pub(crate) fn observed(level: Level) -> (Logger, ObservedLogs) {
    observed_with(Logger::builder().level(level))
}

/// Finishes `builder` with the returned buffer as its only output and error output.
pub(crate) fn observed_with(builder: LoggerBuilder) -> (Logger, ObservedLogs) {
    let logs = ObservedLogs::new();
    let logger = builder.sink(logs.sink()).error_sink(logs.sink()).build();
    (logger, logs)
}

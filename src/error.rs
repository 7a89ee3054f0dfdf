//! Error types for logger construction and shutdown.

use thiserror::Error;

/// Errors surfaced by the logging facade.
///
/// Emission itself never fails from the caller's point of view; these are only
/// returned from construction ([`Logger::new`](crate::Logger::new)) and from
/// [`Logger::sync`](crate::Logger::sync).
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration could not be turned into a logger.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A sink could not be written or flushed.
    #[error("sink {sink}: {source}")]
    Io {
        sink: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns true for construction-time failures.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true for sink write/flush failures.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Result type for logging operations.
pub type Result<T> = std::result::Result<T, Error>;

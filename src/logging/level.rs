//! Severity levels.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Ordered log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// Panics after emission in development mode, behaves like `Error` otherwise.
    DPanic,
    /// Panics after emission.
    Panic,
    /// Exits the process after emission.
    Fatal,
}

impl Level {
    /// All levels in ascending order.
    pub const ALL: [Level; 7] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::DPanic,
        Level::Panic,
        Level::Fatal,
    ];

    /// Lowercase name, as accepted by [`Level::from_str`].
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::DPanic => "dpanic",
            Level::Panic => "panic",
            Level::Fatal => "fatal",
        }
    }

    /// Uppercase name used by the encoders.
    pub const fn as_capital_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::DPanic => "DPANIC",
            Level::Panic => "PANIC",
            Level::Fatal => "FATAL",
        }
    }

    /// `tracing` level records are dispatched at. The three panicking levels
    /// collapse onto `ERROR`.
    pub const fn as_tracing(self) -> tracing::Level {
        match self {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            _ => tracing::Level::ERROR,
        }
    }

    /// ANSI color code for the development preset.
    pub(crate) const fn color(self) -> u8 {
        match self {
            Level::Debug => 35,
            Level::Info => 34,
            Level::Warn => 33,
            _ => 31,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    /// Parses an all-lowercase or all-uppercase level name. The empty string
    /// is `Info`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Level::Info);
        }
        Level::ALL
            .into_iter()
            .find(|level| s == level.as_str() || s == level.as_capital_str())
            .ok_or_else(|| Error::config(format!("unrecognized level: {:?}", s)))
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_level_name() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
            assert_eq!(level.as_capital_str().parse::<Level>().unwrap(), level);
        }
    }

    #[test]
    fn empty_is_info() {
        assert_eq!("".parse::<Level>().unwrap(), Level::Info);
    }

    #[test]
    fn rejects_unknown_names() {
        for bad in ["verbose", "warning", " info", "trace", "Warn", "wArN", "Info", "dPanic"] {
            let err = bad.parse::<Level>().unwrap_err();
            assert!(err.is_configuration(), "{bad} should be rejected");
        }
    }

    #[test]
    fn ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn tracing_levels_map_down() {
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Debug);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
    }
}

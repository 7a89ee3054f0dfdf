//! Configuration schema definitions.
//!
//! The logger consumes an already-deserialized [`LoggerConfig`]; where the
//! values come from (YAML, TOML, environment, flags) is the host's concern.

use serde::{Deserialize, Serialize};

/// Declarative logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum severity name (debug, info, warn, error, dpanic, panic, fatal).
    pub log_level: String,

    /// Use the development preset (human-oriented keys, colorized levels).
    pub development: bool,

    /// Output encoding, "json" or "console". Empty means "json".
    pub encoding: String,

    /// Output sinks in order: "stdout", "stderr" or file paths.
    /// "stderr" is always appended.
    pub output_paths: Vec<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            development: false,
            encoding: String::new(),
            output_paths: Vec::new(),
        }
    }
}

impl LoggerConfig {
    /// Primary output sinks after the mandatory "stderr" is appended.
    pub fn resolved_output_paths(&self) -> Vec<String> {
        let mut paths = self.output_paths.clone();
        paths.push(STDERR.to_string());
        paths
    }

    /// Error output sinks. Always exactly "stderr".
    pub fn resolved_error_output_paths(&self) -> Vec<String> {
        vec![STDERR.to_string()]
    }
}

/// Sink name for the process's standard output.
pub const STDOUT: &str = "stdout";

/// Sink name for the process's standard error.
pub const STDERR: &str = "stderr";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggerConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.development);
        assert!(config.encoding.is_empty());
        assert_eq!(config.resolved_output_paths(), vec!["stderr"]);
    }

    #[test]
    fn stderr_is_always_appended() {
        let config = LoggerConfig {
            output_paths: vec!["stdout".into(), "stderr".into()],
            ..Default::default()
        };
        assert_eq!(
            config.resolved_output_paths(),
            vec!["stdout", "stderr", "stderr"]
        );
        assert_eq!(config.resolved_error_output_paths(), vec!["stderr"]);
    }

    #[test]
    fn deserializes_from_partial_document() {
        let config: LoggerConfig = toml::from_str(
            r#"
            log_level = "debug"
            output_paths = ["/var/log/app.log"]
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(!config.development);
        assert_eq!(config.output_paths, vec!["/var/log/app.log"]);
    }
}

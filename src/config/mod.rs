//! Logger configuration.
//!
//! # Data Flow
//! ```text
//! externally loaded document (YAML/TOML/flags)
//!     → LoggerConfig (serde, defaults filled in)
//!     → Logger::new (level/encoding resolution, sinks opened)
//!     → Logger shared by every component that logs
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a logger is built from it
//! - All fields have defaults to allow minimal configs

pub mod schema;

pub use schema::LoggerConfig;

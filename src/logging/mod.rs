//! Structured logging facade.
//!
//! # Data Flow
//! ```text
//! LoggerConfig
//!     → level.rs (severity name → Level)
//!     → encoder.rs (encoding name + preset → RecordFormat)
//!     → sink.rs (output paths → SinkSet, "stderr" appended)
//!     → logger.rs (Logger: shared core + name + standing fields;
//!                  the core owns a tracing Dispatch: registry + LevelFilter + fmt layer)
//!
//! Call sites:
//!     logger.info("msg", fields! { .. })
//!         → record.rs (Record → event on a per-level callsite)
//!         → fmt layer → RecordFormat → MakeWriter tee over every sink
//!         → files drained by a non-blocking worker, flushed on sync
//!     tracing events → bridge.rs (LoggerLayer) → same path
//! ```
//!
//! # Design Decisions
//! - The logger is an explicit value handed to whoever logs; no global instance
//! - Fields are typed (`Value`) rather than untyped variadics
//! - Emission is best effort; sink failures surface only from `sync`

pub mod bridge;
pub mod context;
pub mod encoder;
pub mod field;
pub mod level;
pub mod logger;
#[cfg(test)]
pub(crate) mod observer;
mod record;
pub mod sink;

pub use bridge::LoggerLayer;
pub use context::RequestContext;
pub use encoder::{Encoding, EncoderPreset};
pub use field::{Field, Fields, Value};
pub use level::Level;
pub use logger::{Logger, LoggerBuilder};
pub use sink::Sink;

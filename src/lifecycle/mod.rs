//! Process lifecycle hooks.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown future resolves
//!
//! Shutdown (shutdown.rs):
//!     server drained → Logger::sync → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::sync_logger;
pub use signals::shutdown_signal;

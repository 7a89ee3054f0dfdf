//! Final flush of the process logger.

use crate::error::Result;
use crate::fields;
use crate::logging::Logger;

/// Logs the shutdown and flushes every sink.
///
/// The flush error is returned so the caller can pick the exit status; there
/// is no sink left to report it on.
pub fn sync_logger(logger: &Logger) -> Result<()> {
    logger.info("shutdown complete", fields! {});
    logger.sync()
}

//! OS signal handling.

use crate::fields;
use crate::logging::{Logger, Value};

/// Resolves on Ctrl+C, or SIGTERM on unix.
///
/// A handler that cannot be installed is logged and treated as never firing.
pub async fn shutdown_signal(logger: Logger) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            logger.error("failed to install Ctrl+C handler", fields! { "error" => Value::error(&e) });
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                logger.error("failed to install SIGTERM handler", fields! { "error" => Value::error(&e) });
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    logger.info("shutdown signal received", fields! {});
}

//! HTTP request instrumentation.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → access_log.rs (start timer, capture method/path/query/ip/agent,
//!                      insert RequestErrors + RequestContext)
//!     → wrapped handler chain (may push onto RequestErrors)
//!     → access_log.rs (latency, one record per error or one Info record)
//!     → response returned unchanged
//! ```

pub mod access_log;
pub mod client_ip;
pub mod errors;

pub use access_log::{AccessLogLayer, AccessLogService, HTTP_REQUEST_MESSAGE};
pub use client_ip::client_ip;
pub use errors::RequestErrors;

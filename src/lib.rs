//! Structured logging facade with request-lifecycle instrumentation.
//!
//! Build one [`Logger`] at startup from a [`LoggerConfig`], then hand clones of
//! it to [`AccessLogLayer`] (HTTP) and [`RpcLogLayer`] / [`intercept_unary`]
//! (unary RPC). Each request or call produces exactly one summary record, or
//! one record per accumulated handler error.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod rpc;

pub use config::LoggerConfig;
pub use error::{Error, Result};
pub use http::{AccessLogLayer, RequestErrors};
pub use logging::{Field, Fields, Level, Logger, LoggerLayer, RequestContext, Sink, Value};
pub use rpc::{intercept_unary, RpcLogLayer, UnaryCall, UnaryRequest, UnaryResponse};

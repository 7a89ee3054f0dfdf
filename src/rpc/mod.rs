//! Unary RPC instrumentation.
//!
//! # Data Flow
//! ```text
//! unary call (full method, context, payload)
//!     → interceptor.rs (start timer, derive logger with request id)
//!     → wrapped handler / service
//!     → interceptor.rs (Info "RPC request" or Error "RPC request failed")
//!     → original result returned
//! ```

pub mod interceptor;

pub use interceptor::{
    intercept_unary, RpcLogLayer, RpcLogService, UnaryCall, UnaryRequest, UnaryResponse,
    RPC_FAILED_MESSAGE, RPC_REQUEST_MESSAGE,
};

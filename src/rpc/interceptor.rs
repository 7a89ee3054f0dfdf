//! Unary RPC call logging.
//!
//! # Responsibilities
//! - Time one unary call through the wrapped handler or service
//! - Emit one `Info` record on success, one `Error` record on failure
//! - Return the handler's result unchanged
//!
//! Two entry points share the same records: [`intercept_unary`] for plain async
//! handlers and [`RpcLogLayer`] for tower services. The layer also accepts
//! `http::Request`s, so it can wrap a gRPC server's routes: the method is the
//! request path and a non-zero `grpc-status` response header counts as failure.

use std::fmt;
use std::future::Future;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use http::HeaderMap;
use tower::{Layer, Service};

use crate::fields;
use crate::logging::{Logger, RequestContext, Value};

pub const RPC_REQUEST_MESSAGE: &str = "RPC request";
pub const RPC_FAILED_MESSAGE: &str = "RPC request failed";

const GRPC_STATUS: &str = "grpc-status";
const GRPC_MESSAGE: &str = "grpc-message";

/// A unary call as seen by the interceptor.
pub trait UnaryRequest {
    /// Fully-qualified method, e.g. `/package.Service/Method`.
    fn full_method(&self) -> &str;

    /// Request-scoped context carried by the call, if any.
    fn context(&self) -> Option<RequestContext> {
        None
    }
}

/// A successful reply that may still describe a failed call.
pub trait UnaryResponse {
    /// Failure carried inside an `Ok` reply.
    fn failure(&self) -> Option<String> {
        None
    }
}

impl UnaryResponse for () {}

impl UnaryResponse for String {}

/// gRPC over HTTP/2: the method is the path, e.g. `/package.Service/Method`.
impl<B> UnaryRequest for http::Request<B> {
    fn full_method(&self) -> &str {
        self.uri().path()
    }

    fn context(&self) -> Option<RequestContext> {
        let ctx = self
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::from_headers(self.headers()));
        Some(ctx)
    }
}

/// Failed gRPC calls answer trailers-only, with the status in the headers.
impl<B> UnaryResponse for http::Response<B> {
    fn failure(&self) -> Option<String> {
        grpc_failure(self.headers())
    }
}

fn grpc_failure(headers: &HeaderMap) -> Option<String> {
    let status = headers.get(GRPC_STATUS)?.to_str().unwrap_or("unknown");
    if status == "0" {
        return None;
    }
    match headers.get(GRPC_MESSAGE).and_then(|v| v.to_str().ok()) {
        Some(message) if !message.is_empty() => {
            Some(format!("grpc-status {}: {}", status, message))
        }
        _ => Some(format!("grpc-status {}", status)),
    }
}

/// Generic unary call envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryCall<T> {
    pub method: String,
    pub context: RequestContext,
    pub payload: T,
}

impl<T> UnaryCall<T> {
    pub fn new(method: impl Into<String>, payload: T) -> Self {
        Self {
            method: method.into(),
            context: RequestContext::default(),
            payload,
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

impl<T> UnaryRequest for UnaryCall<T> {
    fn full_method(&self) -> &str {
        &self.method
    }

    fn context(&self) -> Option<RequestContext> {
        Some(self.context.clone())
    }
}

fn log_outcome<E: fmt::Display + ?Sized>(
    logger: &Logger,
    method: &str,
    duration: Duration,
    err: Option<&E>,
) {
    match err {
        Some(err) => logger.error(
            RPC_FAILED_MESSAGE,
            fields! {
                "method" => method,
                "duration" => duration,
                "error" => Value::error(err),
            },
        ),
        None => logger.info(
            RPC_REQUEST_MESSAGE,
            fields! {
                "method" => method,
                "duration" => duration,
            },
        ),
    }
}

/// Runs `handler` on `call` and logs the outcome.
pub async fn intercept_unary<Req, F, Fut, R, E>(logger: &Logger, call: Req, handler: F) -> Result<R, E>
where
    Req: UnaryRequest,
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: fmt::Display,
{
    let method = call.full_method().to_string();
    let logger = logger.with_context(call.context().as_ref());

    let start = Instant::now();
    let result = handler(call).await;
    log_outcome(&logger, &method, start.elapsed(), result.as_ref().err());
    result
}

/// Tower layer logging every unary call through the wrapped service.
#[derive(Debug, Clone)]
pub struct RpcLogLayer {
    logger: Logger,
}

impl RpcLogLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for RpcLogLayer {
    type Service = RpcLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RpcLogService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Service produced by [`RpcLogLayer`].
#[derive(Debug, Clone)]
pub struct RpcLogService<S> {
    inner: S,
    logger: Logger,
}

impl<S, Req> Service<Req> for RpcLogService<S>
where
    Req: UnaryRequest + 'static,
    S: Service<Req> + 'static,
    S::Response: UnaryResponse,
    S::Future: Send + 'static,
    S::Error: fmt::Display,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let method = req.full_method().to_string();
        let logger = self.logger.with_context(req.context().as_ref());
        let start = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            let elapsed = start.elapsed();
            match &result {
                Ok(response) => {
                    let failure = response.failure();
                    log_outcome(&logger, &method, elapsed, failure.as_deref());
                }
                Err(err) => log_outcome(&logger, &method, elapsed, Some(err)),
            }
            result
        })
    }
}

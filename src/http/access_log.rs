//! HTTP access logging middleware.
//!
//! # Responsibilities
//! - Time every request through the wrapped service
//! - Hand handlers a [`RequestErrors`] list and a [`RequestContext`]
//! - Emit one `Info` record per clean request, one `Error` record per
//!   accumulated error otherwise
//!
//! # Design Decisions
//! - Purely observational: the response (or error) passes through unchanged
//! - Request metadata is captured before the inner call; handlers may consume
//!   the request
//! - An `Err` from the inner service is logged with status 500

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::extract::OriginalUri;
use axum::http::{Request, Response};
use tower::{Layer, Service};

use crate::fields;
use crate::http::client_ip::client_ip;
use crate::http::errors::RequestErrors;
use crate::logging::{Fields, Logger, RequestContext};

/// Message of the record emitted for requests without errors.
pub const HTTP_REQUEST_MESSAGE: &str = "HTTP request";

/// Tower layer that logs one summary per request.
#[derive(Debug, Clone)]
pub struct AccessLogLayer {
    logger: Logger,
}

impl AccessLogLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Service produced by [`AccessLogLayer`].
#[derive(Debug, Clone)]
pub struct AccessLogService<S> {
    inner: S,
    logger: Logger,
}

/// What the layer knows about a request before the handler runs.
struct Observation {
    start: Instant,
    method: String,
    path: String,
    query: String,
    ip: String,
    user_agent: String,
}

impl Observation {
    fn capture<B>(req: &Request<B>) -> Self {
        // Nested routers strip their prefix from `req.uri()`.
        let uri = req
            .extensions()
            .get::<OriginalUri>()
            .map_or(req.uri(), |original| &original.0);
        Self {
            start: Instant::now(),
            method: req.method().to_string(),
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
            ip: client_ip(req),
            user_agent: req
                .headers()
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn fields(&self, status: u16, latency: Duration) -> Fields {
        fields! {
            "status" => status,
            "method" => self.method.as_str(),
            "path" => self.path.as_str(),
            "query" => self.query.as_str(),
            "ip" => self.ip.as_str(),
            "user-agent" => self.user_agent.as_str(),
            "latency" => latency,
        }
    }

    fn finish(self, logger: &Logger, status: u16, errors: &[String]) {
        let fields = self.fields(status, self.start.elapsed());
        if errors.is_empty() {
            logger.info(HTTP_REQUEST_MESSAGE, fields);
        } else {
            for err in errors {
                logger.error(err, fields.clone());
            }
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AccessLogService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + 'static,
    S::Future: Send + 'static,
    S::Error: fmt::Display,
    ReqBody: 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let observation = Observation::capture(&req);

        let ctx = req
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::from_headers(req.headers()));
        let logger = self.logger.with_context(Some(&ctx));

        let errors = RequestErrors::new();
        req.extensions_mut().insert(errors.clone());
        req.extensions_mut().insert(ctx);

        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            match &result {
                Ok(response) => {
                    observation.finish(&logger, response.status().as_u16(), &errors.snapshot())
                }
                Err(err) => observation.finish(&logger, 500, &[err.to_string()]),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::observer::observed;
    use crate::logging::Level;
    use axum::body::Body;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    #[tokio::test]
    async fn inner_error_is_logged_as_500_and_returned() {
        let (logger, logs) = observed(Level::Info);
        let svc = AccessLogLayer::new(logger).layer(service_fn(|_req: Request<Body>| async {
            Err::<Response<Body>, _>(std::io::Error::other("connection reset"))
        }));

        let err = svc
            .oneshot(Request::get("/x").body(Body::empty()).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection reset");

        let errors = logs.at_level(Level::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["msg"], "connection reset");
        assert_eq!(errors[0]["status"], 500);
    }

    #[tokio::test]
    async fn response_passes_through_untouched() {
        let (logger, logs) = observed(Level::Info);
        let svc = AccessLogLayer::new(logger).layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(StatusCode::CREATED)
                    .header("x-custom", "1")
                    .body(Body::empty())
                    .unwrap(),
            )
        }));

        let res = svc
            .oneshot(Request::post("/items").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()["x-custom"], "1");
        assert_eq!(logs.with_message(HTTP_REQUEST_MESSAGE)[0]["status"], 201);
    }

    #[tokio::test]
    async fn handler_sees_request_errors_extension() {
        let (logger, logs) = observed(Level::Info);
        let svc = AccessLogLayer::new(logger).layer(service_fn(|req: Request<Body>| async move {
            let errors = RequestErrors::from_extensions(req.extensions()).unwrap();
            errors.push("first");
            errors.push("second");
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        svc.oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let messages: Vec<String> = logs
            .at_level(Level::Error)
            .iter()
            .map(|e| e["msg"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert!(logs.at_level(Level::Info).is_empty());
    }
}

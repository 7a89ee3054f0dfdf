//! reqlog demo server.
//!
//! Serves a few routes behind the access log layer and dispatches
//! `/rpc/{service}/{method}` through the RPC interceptor.
//!
//! ```text
//! curl localhost:8080/
//! curl localhost:8080/fail
//! curl -XPOST localhost:8080/rpc/demo.Echo/Say -d hello
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::process::ExitCode;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Router};
use clap::Parser;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::{service_fn, ServiceBuilder, ServiceExt};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use reqlog::lifecycle::{shutdown_signal, sync_logger};
use reqlog::{
    fields, AccessLogLayer, Logger, LoggerConfig, LoggerLayer, RequestContext, RequestErrors,
    RpcLogLayer, UnaryCall, Value,
};

#[derive(Debug, Parser)]
#[command(name = "reqlog-demo", about = "Demo server for the reqlog middleware")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Minimum log level.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Use the development preset.
    #[arg(long)]
    development: bool,

    /// "json" or "console".
    #[arg(long, default_value = "")]
    encoding: String,

    /// Extra output sink; repeatable. stderr is always included.
    #[arg(long = "output-path")]
    output_paths: Vec<String>,
}

impl Args {
    fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            log_level: self.log_level.clone(),
            development: self.development,
            encoding: self.encoding.clone(),
            output_paths: self.output_paths.clone(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    logger: Logger,
}

#[derive(Debug, Error)]
enum RpcError {
    #[error("unimplemented method {0}")]
    Unimplemented(String),
}

async fn echo(call: UnaryCall<String>) -> Result<String, RpcError> {
    match call.method.as_str() {
        "/demo.Echo/Say" => Ok(call.payload),
        other => Err(RpcError::Unimplemented(other.to_string())),
    }
}

async fn index() -> &'static str {
    "ok\n"
}

async fn fail(errors: RequestErrors) -> (StatusCode, &'static str) {
    errors.push("demo failure: nothing works here");
    (StatusCode::INTERNAL_SERVER_ERROR, "failed\n")
}

async fn rpc_call(
    State(state): State<AppState>,
    Path((service, method)): Path<(String, String)>,
    Extension(ctx): Extension<RequestContext>,
    errors: RequestErrors,
    body: String,
) -> (StatusCode, String) {
    let ctx = match ctx.request_id {
        Some(_) => ctx,
        None => RequestContext::with_request_id(Uuid::new_v4().to_string()),
    };
    let call = UnaryCall::new(format!("/{}/{}", service, method), body).with_context(ctx);

    let svc = ServiceBuilder::new()
        .layer(RpcLogLayer::new(state.logger.named("rpc")))
        .service_fn(echo);

    match svc.oneshot(call).await {
        Ok(reply) => (StatusCode::OK, reply),
        Err(e) => {
            errors.push(&e);
            (StatusCode::NOT_IMPLEMENTED, format!("{}\n", e))
        }
    }
}

fn router(logger: Logger) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/fail", get(fail))
        .route("/rpc/{service}/{method}", post(rpc_call))
        .route(
            "/healthz",
            get(|| async { Ok::<_, Infallible>(StatusCode::NO_CONTENT) }),
        )
        .with_state(AppState {
            logger: logger.clone(),
        })
        .layer(AccessLogLayer::new(logger.named("http")))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn run(args: Args, logger: Logger) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(&args.bind).await?;
    let local_addr = listener.local_addr()?;
    logger.info(
        "listening for connections",
        fields! { "address" => local_addr.to_string() },
    );

    let app = router(logger.clone()).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(logger.clone()))
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let bootstrap = Logger::new_default();
    let logger = match Logger::new(&args.logger_config()) {
        Ok(logger) => logger,
        Err(e) => {
            bootstrap.error(
                "invalid logger configuration",
                fields! { "error" => Value::error(&e) },
            );
            let _ = bootstrap.sync();
            return ExitCode::FAILURE;
        }
    };

    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tower_http=debug,axum=info".into()),
        )
        .with(LoggerLayer::new(logger.clone()))
        .try_init();

    logger.info(
        "reqlog-demo starting",
        fields! { "version" => env!("CARGO_PKG_VERSION"), "level" => logger.level().as_str() },
    );

    let served = run(args, logger.clone()).await;
    if let Err(e) = &served {
        logger.error("server error", fields! { "error" => Value::error(e) });
    }

    match (served, sync_logger(&logger)) {
        (Ok(()), Ok(())) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

//! End-to-end tests for the HTTP access log layer.

use axum::http::StatusCode;
use axum::Router;
use reqlog::Level;
use tower::ServiceExt;

mod common;

use common::observed;

#[tokio::test]
async fn clean_request_emits_one_info_record() {
    let (logger, logs) = observed(Level::Info);
    let res = common::app(logger)
        .oneshot(common::get_request("/foo?x=1", Some("curl/8.0")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let entries = logs.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry["level"], "INFO");
    assert_eq!(entry["msg"], "HTTP request");
    assert_eq!(entry["status"], 200);
    assert_eq!(entry["method"], "GET");
    assert_eq!(entry["path"], "/foo");
    assert_eq!(entry["query"], "x=1");
    assert_eq!(entry["user-agent"], "curl/8.0");
    assert_eq!(entry["ip"], "");
    assert!(entry["latency"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn nested_router_logs_the_full_path() {
    let (logger, logs) = observed(Level::Info);
    let res = Router::new()
        .nest("/api", common::app(logger))
        .oneshot(common::get_request("/api/foo?x=1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let entries = logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["path"], "/api/foo");
    assert_eq!(entries[0]["query"], "x=1");
}

#[tokio::test]
async fn handler_error_emits_error_record_and_no_info() {
    let (logger, logs) = observed(Level::Info);
    let res = common::app(logger)
        .oneshot(common::get_request("/broken?retry=2", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    assert!(logs.at_level(Level::Info).is_empty());
    let errors = logs.at_level(Level::Error);
    assert_eq!(errors.len(), 1);
    let entry = &errors[0];
    assert_eq!(entry["msg"], "upstream unavailable");
    assert_eq!(entry["status"], 502);
    assert_eq!(entry["method"], "GET");
    assert_eq!(entry["path"], "/broken");
    assert_eq!(entry["query"], "retry=2");
    assert_eq!(entry["user-agent"], "");
    assert!(entry["latency"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn unknown_route_is_still_logged() {
    let (logger, logs) = observed(Level::Info);
    let res = common::app(logger)
        .oneshot(common::get_request("/missing", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(logs.with_message("HTTP request")[0]["status"], 404);
}

#[tokio::test]
async fn request_id_header_is_attached() {
    let (logger, logs) = observed(Level::Info);
    let mut req = common::get_request("/foo", None);
    req.headers_mut()
        .insert("x-request-id", "abc".parse().unwrap());

    common::app(logger).oneshot(req).await.unwrap();
    assert_eq!(logs.entries()[0]["request_id"], "abc");
}

#[tokio::test]
async fn forwarded_for_header_sets_ip() {
    let (logger, logs) = observed(Level::Info);
    let mut req = common::get_request("/foo", None);
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());

    common::app(logger).oneshot(req).await.unwrap();
    assert_eq!(logs.entries()[0]["ip"], "203.0.113.9");
}

#[tokio::test]
async fn served_request_reports_peer_address() {
    let (logger, logs) = observed(Level::Info);
    let addr = common::serve(common::app(logger)).await;

    let response = common::raw_get(addr, "/foo?x=1").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");

    let entries = logs.with_message("HTTP request");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["ip"], "127.0.0.1");
    assert_eq!(entries[0]["user-agent"], "raw-test/1.0");
    assert_eq!(entries[0]["query"], "x=1");
}

#[tokio::test]
async fn concurrent_requests_each_log_once() {
    let (logger, logs) = observed(Level::Info);
    let app = common::app(logger);

    let mut handles = Vec::new();
    for i in 0..16 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.oneshot(common::get_request(&format!("/foo?i={}", i), None))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().status(), StatusCode::OK);
    }

    let entries = logs.with_message("HTTP request");
    assert_eq!(entries.len(), 16);
    let mut queries: Vec<String> = entries
        .iter()
        .map(|e| e["query"].as_str().unwrap().to_string())
        .collect();
    queries.sort();
    queries.dedup();
    assert_eq!(queries.len(), 16);
}

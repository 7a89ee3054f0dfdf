//! Client address resolution.
//!
//! # Design Decisions
//! - First valid `X-Forwarded-For` entry wins, then `X-Real-IP`
//! - Falls back to the peer address from axum's `ConnectInfo`
//! - Header values that do not parse as IP addresses are ignored

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Best-effort client IP for a request; empty when unknown.
pub fn client_ip<B>(req: &Request<B>) -> String {
    from_headers(req.headers())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .map(|ip| ip.to_string())
        .unwrap_or_default()
}

fn from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    forwarded.or_else(|| {
        headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/")
    }

    #[test]
    fn forwarded_for_wins() {
        let req = request()
            .header(X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
            .header(X_REAL_IP, "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn real_ip_when_forwarded_is_garbage() {
        let req = request()
            .header(X_FORWARDED_FOR, "not-an-ip")
            .header(X_REAL_IP, "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "198.51.100.2");
    }

    #[test]
    fn peer_address_fallback() {
        let mut req = request().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "");

        let peer: SocketAddr = "127.0.0.1:54321".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_ip(&req), "127.0.0.1");
    }
}

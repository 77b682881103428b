//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream
//! - Strip hop-by-hop headers in both directions
//! - Add `X-Forwarded-For`, `X-Real-IP` and `X-Forwarded-Proto`
//! - Map transport failures to `502 Bad Gateway`

use axum::{
    body::Body,
    http::{request::Parts, HeaderMap, HeaderValue, Request, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::server::AppState;
use crate::security::client_ip::{ClientInfo, X_FORWARDED_FOR, X_FORWARDED_PROTO, X_REAL_IP};

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// `http://{upstream}{path?query}`
pub fn upstream_uri(upstream: &str, original: &Uri) -> Result<Uri, axum::http::Error> {
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Uri::builder()
        .scheme("http")
        .authority(upstream)
        .path_and_query(path_and_query)
        .build()
}

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Append the client to a trusted forwarding chain, or start a new one.
pub fn add_forwarded_headers(headers: &mut HeaderMap, client: &ClientInfo, trust_chain: bool) {
    let ip = client.ip.to_string();
    let existing = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| trust_chain && !v.trim().is_empty());
    let chain = match existing {
        Some(existing) => format!("{}, {}", existing, ip),
        None => ip.clone(),
    };

    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(&ip) {
        headers.insert(X_REAL_IP, value);
    }
    let proto = if client.secure { "https" } else { "http" };
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(proto));
}

fn bad_gateway() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "success": false,
            "message": "Upstream service unavailable",
        })),
    )
        .into_response()
}

/// Send an admitted request to the upstream and relay its response.
pub async fn forward(state: &AppState, mut parts: Parts, body: Body, client: &ClientInfo) -> Response {
    let (upstream, trust_chain) = {
        let config = state.config.load();
        (config.upstream.address.clone(), config.listener.trust_proxy_headers)
    };
    let uri = match upstream_uri(&upstream, &parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(upstream = %upstream, error = %e, "Invalid upstream URI");
            return bad_gateway();
        }
    };

    strip_hop_by_hop(&mut parts.headers);
    add_forwarded_headers(&mut parts.headers, client, trust_chain);
    parts.uri = uri;
    parts.version = Version::HTTP_11;

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(upstream = %upstream, client = %client.ip, error = %e, "Upstream request failed");
            bad_gateway()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use std::net::IpAddr;

    fn client(ip: &str, secure: bool) -> ClientInfo {
        ClientInfo {
            ip: ip.parse::<IpAddr>().unwrap(),
            secure,
        }
    }

    #[test]
    fn test_upstream_uri_keeps_path_and_query() {
        let original: Uri = "/api/games/search?q=zelda&page=2".parse().unwrap();
        let uri = upstream_uri("127.0.0.1:5000", &original).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:5000/api/games/search?q=zelda&page=2");

        let bare: Uri = "http://example.com".parse().unwrap();
        assert_eq!(upstream_uri("backend:5000", &bare).unwrap().path(), "/");
    }

    #[test]
    fn test_forwarded_headers_extend_chain() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        add_forwarded_headers(&mut headers, &client("10.0.0.2", true), true);

        assert_eq!(headers[X_FORWARDED_FOR], "203.0.113.7, 10.0.0.2");
        assert_eq!(headers[X_REAL_IP], "10.0.0.2");
        assert_eq!(headers[X_FORWARDED_PROTO], "https");
    }

    #[test]
    fn test_untrusted_chain_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("6.6.6.6, 7.7.7.7"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("6.6.6.6"));
        add_forwarded_headers(&mut headers, &client("198.51.100.4", false), false);

        assert_eq!(headers[X_FORWARDED_FOR], "198.51.100.4");
        assert_eq!(headers[X_REAL_IP], "198.51.100.4");
        assert_eq!(headers[X_FORWARDED_PROTO], "http");
    }

    #[test]
    fn test_hop_by_hop_headers_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        strip_hop_by_hop(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(header::UPGRADE).is_none());
        assert!(headers.get(header::CONTENT_TYPE).is_some());
    }
}

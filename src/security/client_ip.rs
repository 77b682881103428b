//! Client identity for rate limiting and violation tracking.
//!
//! The socket peer is authoritative unless the gate sits behind a trusted
//! proxy, in which case `X-Real-IP` and then the first `X-Forwarded-For`
//! hop are used. Forwarded headers from untrusted peers are ignored.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

use crate::http::server::AppState;

pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Resolved per-request client facts, stored as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: IpAddr,
    /// The request reached the client-facing edge over TLS.
    pub secure: bool,
}

pub fn resolve_client_ip(headers: &HeaderMap, peer: IpAddr, trust_proxy_headers: bool) -> IpAddr {
    if !trust_proxy_headers {
        return peer;
    }

    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip(X_REAL_IP)
        .or_else(|| header_ip(X_FORWARDED_FOR))
        .unwrap_or(peer)
}

pub fn is_secure(headers: &HeaderMap, tls_listener: bool, trust_proxy_headers: bool) -> bool {
    if tls_listener {
        return true;
    }
    trust_proxy_headers
        && headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().eq_ignore_ascii_case("https"))
            .unwrap_or(false)
}

/// Attach [`ClientInfo`] to every request. Must run before rate limiting.
pub async fn client_info_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let trust = state.config.load().listener.trust_proxy_headers;
    let info = ClientInfo {
        ip: resolve_client_ip(request.headers(), peer.ip(), trust),
        secure: is_secure(request.headers(), state.tls, trust),
    };
    request.extensions_mut().insert(info);
    next.run(request).await
}

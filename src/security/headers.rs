//! Response security headers.
//!
//! A fixed header set is built once from config and stamped on every
//! response. `Strict-Transport-Security` is only sent for requests that
//! arrived over TLS, and the `Server` header is removed.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::config::SecurityHeadersConfig;
use crate::http::server::AppState;
use crate::security::client_ip::is_secure;

const PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=(), payment=(), \
usb=(), magnetometer=(), gyroscope=(), accelerometer=()";

/// Prebuilt header values.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    enabled: bool,
    fixed: HeaderMap,
    hsts: HeaderValue,
}

impl SecurityHeaders {
    /// Build the header set. Fails if a configured CSP source is not a valid header value.
    pub fn from_config(config: &SecurityHeadersConfig) -> Result<Self, header::InvalidHeaderValue> {
        let mut fixed = HeaderMap::new();
        fixed.insert(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_str(&content_security_policy(config))?,
        );
        fixed.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        fixed.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        fixed.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        fixed.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        fixed.insert(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static(PERMISSIONS_POLICY),
        );

        let hsts = HeaderValue::from_str(&format!(
            "max-age={}; includeSubDomains",
            config.hsts_max_age_secs
        ))?;

        Ok(Self {
            enabled: config.enabled,
            fixed,
            hsts,
        })
    }

    /// Decorate `headers`. `secure` is whether the request came over TLS.
    pub fn apply(&self, headers: &mut HeaderMap, secure: bool) {
        if !self.enabled {
            return;
        }
        for (name, value) in &self.fixed {
            headers.insert(name.clone(), value.clone());
        }
        if secure {
            headers.insert(header::STRICT_TRANSPORT_SECURITY, self.hsts.clone());
        }
        headers.remove(header::SERVER);
    }
}

fn content_security_policy(config: &SecurityHeadersConfig) -> String {
    let with_self = |sources: &[String]| {
        std::iter::once("'self'")
            .chain(sources.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    };

    [
        "default-src 'self'".to_string(),
        format!("script-src {} 'unsafe-inline'", with_self(&config.script_sources)),
        "style-src 'self' 'unsafe-inline'".to_string(),
        "img-src 'self' data: https: http:".to_string(),
        "font-src 'self' data:".to_string(),
        format!("connect-src {}", with_self(&config.connect_sources)),
        format!("frame-src {}", with_self(&config.frame_sources)),
        "media-src 'self' https:".to_string(),
        "object-src 'none'".to_string(),
        "base-uri 'self'".to_string(),
        "form-action 'self'".to_string(),
        "frame-ancestors 'none'".to_string(),
    ]
    .join("; ")
}

/// Outermost gate layer, so rejections and timeouts are decorated too.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let trust = state.config.load().listener.trust_proxy_headers;
    let secure = is_secure(request.headers(), state.tls, trust);

    let mut response = next.run(request).await;
    state.headers.load().apply(response.headers_mut(), secure);
    response
}

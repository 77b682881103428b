//! Gate-owned endpoints and the forwarding fallback.

use axum::{
    body::{Body, Bytes},
    extract::{Extension, FromRequest, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::proxy;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::bot::{FormToken, RegistrationForm};
use crate::security::client_ip::ClientInfo;

/// Body of a rejected registration.
#[derive(Debug, Serialize)]
struct RegistrationRejected {
    success: bool,
    message: &'static str,
    reasons: Vec<String>,
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
    }))
}

/// Render time and decoy field name for a fresh registration form.
pub async fn form_token_handler(State(state): State<AppState>) -> Json<FormToken> {
    Json(state.bot_gate.issue_form_token())
}

/// Buffer a registration submission, run the bot gate, and forward only if it passes.
pub async fn register_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let mut buffered = Request::new(body);
    *buffered.extensions_mut() = parts.extensions.clone();
    let bytes = match Bytes::from_request(buffered, &state).await {
        Ok(bytes) => bytes,
        Err(rejection) => {
            let status = rejection.status();
            tracing::warn!(client = %client.ip, status = status.as_u16(), error = %rejection, "Could not read registration body");
            metrics::record_request("registration", status.as_u16());
            let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                "Request body too large"
            } else {
                "Could not read request body"
            };
            return (status, Json(json!({ "success": false, "message": message }))).into_response();
        }
    };

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    // Undecodable bodies are judged as an empty form.
    let form = RegistrationForm::parse(content_type, &bytes).unwrap_or_default();
    let user_agent = parts
        .headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    let verdict = state
        .bot_gate
        .validate_registration(&form, &client.ip.to_string(), user_agent);
    if !verdict.accepted {
        metrics::record_request("registration", StatusCode::BAD_REQUEST.as_u16());
        return (
            StatusCode::BAD_REQUEST,
            Json(RegistrationRejected {
                success: false,
                message: "Registration rejected",
                reasons: verdict.reasons,
            }),
        )
            .into_response();
    }

    let response = proxy::forward(&state, parts, Body::from(bytes), &client).await;
    metrics::record_request("registration", response.status().as_u16());
    response
}

/// Forward everything the gate does not answer itself.
pub async fn proxy_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    request: Request<Body>,
) -> Response {
    let class = state
        .routes
        .limiter_for(request.uri().path())
        .map(|kind| kind.as_str())
        .unwrap_or("exempt");

    tracing::debug!(
        client = %client.ip,
        method = %request.method(),
        path = %request.uri().path(),
        "Forwarding request"
    );

    let (parts, body) = request.into_parts();
    let response = proxy::forward(&state, parts, body, &client).await;
    metrics::record_request(class, response.status().as_u16());
    response
}

//! Origin/CORS/PNA gate and API-key + rate-limit middleware (§4.5).
//!
//! Three concerns live here because axum wires them as one middleware
//! stack over `/api*`: origin validation for CORS responses and the
//! streaming upgrade, API-key authentication, and per-IP rate limiting.
//! The `/api*` routes mount [`api_gate`] in front of both the `GET`
//! (streaming upgrade) and `POST` handlers, so a streaming client's auth is
//! checked before the upgrade response is ever written (§4.5).

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::error::AppError;
use crate::state::ServerState;

/// A per-IP token-bucket limiter, shared by the HTTP middleware layer and
/// the streaming session's per-message check (§4.5: "also to streaming
/// inbound messages").
pub struct RateGate {
    limiter: RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>,
}

impl RateGate {
    pub fn new(rps: u32, burst: u32) -> Arc<Self> {
        let rps = NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);
        Arc::new(Self { limiter: RateLimiter::keyed(quota) })
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }
}

/// Extract the API key from either `x-api-key` or a `Bearer` Authorization
/// header.
fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key);
    }
    headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok())?.strip_prefix("Bearer ")
}

/// §4.5: "An API-key middleware is applied to all `/api*` routes." No-op
/// when the server has no configured `auth_token` (local/dev mode).
pub fn require_api_key(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else { return Ok(()) };
    match extract_api_key(headers) {
        Some(got) if constant_time_eq(got, expected) => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

/// Constant-time comparison so a valid key can't be recovered by timing
/// how quickly a near-miss is rejected.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Combined `/api*` middleware: API-key auth, then per-IP rate limiting
/// (§4.5). Static assets and `/health` never pass through this layer — see
/// the route groupings in [`super::build_router`].
pub async fn api_gate(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(e) = require_api_key(req.headers(), state.config.auth_token.as_deref()) {
        return e.to_http_response("unauthorized").into_response();
    }
    if !state.rate_gate.check(addr.ip()) {
        return AppError::RateLimited.to_http_response("rate limit exceeded").into_response();
    }
    next.run(req).await
}

/// Resolve the `Access-Control-Allow-Origin` value for one request's
/// `Origin` header (§4.5), consulting both the static list baked in at
/// startup and the dynamic list fetched fresh from configuration.
pub fn cors_header_for(state: &ServerState, origin: &str) -> Option<HeaderValue> {
    if origin.is_empty() {
        return None;
    }
    if state.origin_validator.is_allowed(origin, &state.config.allowed_origins) {
        HeaderValue::from_str(origin).ok()
    } else {
        None
    }
}

/// CORS + Private Network Access middleware (§4.5). Applies to every
/// request, not just `/api*`: the streaming upgrade and the static app
/// both speak CORS, and the streaming upgrade in particular has no other
/// gate against a hostile cross-origin page. A non-empty `Origin` that
/// fails validation is rejected outright rather than merely omitting the
/// allow header.
pub async fn origin_gate(State(state): State<Arc<ServerState>>, req: Request, next: Next) -> Response {
    let origin =
        req.headers().get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()).unwrap_or("").to_owned();

    if !origin.is_empty() && !state.origin_validator.is_allowed(&origin, &state.config.allowed_origins) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }
    let allow_header = cors_header_for(&state, &origin);

    if req.method() == axum::http::Method::OPTIONS {
        let private_network = req
            .headers()
            .get("access-control-request-private-network")
            .and_then(|v| v.to_str().ok())
            == Some("true");
        let mut resp = Response::builder().status(StatusCode::NO_CONTENT);
        if let Some(allow) = &allow_header {
            resp = resp.header(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN, allow.clone());
        }
        resp = resp
            .header(axum::http::header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS")
            .header(
                axum::http::header::ACCESS_CONTROL_ALLOW_HEADERS,
                "content-type, x-api-key, authorization",
            );
        if private_network {
            resp = resp.header("Access-Control-Allow-Private-Network", "true");
        }
        return resp.body(axum::body::Body::empty()).unwrap_or_default();
    }

    let mut response = next.run(req).await;
    if let Some(allow) = allow_header {
        response.headers_mut().insert(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN, allow);
    }
    response
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

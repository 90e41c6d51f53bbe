//! POST/one-shot HTTP handlers (§4.3, §4.6, §6): the request/response
//! JSON-RPC transport, pairing endpoints, REST launch shortcuts, the
//! static app, health, and (dev builds only) `/debug/*`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rpc::dispatcher::{dispatch, DispatchOutcome};
use crate::rpc::registry::{MethodRegistry, RequestEnv};
use crate::state::ServerState;

/// `GET /health` — liveness probe (§6).
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /` — redirect to the app (§6).
pub async fn root_redirect() -> impl IntoResponse {
    Redirect::temporary("/app/")
}

// -- JSON-RPC request/response transport (§4.3) ------------------------------

/// `POST /api`, `/api/v0`, `/api/v0.1` — one-shot JSON-RPC request/response.
///
/// Body must be `application/json`, capped at 1 MiB ([`axum::extract::DefaultBodyLimit`]
/// on the router handles the 413). Notifications and bare response objects
/// yield `204 No Content`; requests yield `200` with the JSON-RPC response
/// body (§4.3).
pub async fn rpc_post(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    if !content_type.starts_with("application/json") {
        return (StatusCode::BAD_REQUEST, "Content-Type must be application/json").into_response();
    }

    let env =
        RequestEnv { state: Arc::clone(&state), client_id: addr.to_string(), is_local: addr.ip().is_loopback() };

    match dispatch(&body, &state.registry, env).await {
        DispatchOutcome::NoReply => StatusCode::NO_CONTENT.into_response(),
        DispatchOutcome::Reply(bytes) => {
            ([(header::CONTENT_TYPE, "application/json")], bytes).into_response()
        }
    }
}

// -- Pairing (§4.6, §6) -------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PairInitiateResponse {
    #[serde(rename = "pairingToken")]
    pub pairing_token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct PairCompleteRequest {
    #[serde(rename = "pairingToken")]
    pub pairing_token: String,
    pub verifier: String,
    #[serde(rename = "deviceName")]
    pub device_name: String,
}

#[derive(Debug, Serialize)]
pub struct PairCompleteResponse {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "authToken")]
    pub auth_token: String,
    #[serde(rename = "sharedSecret")]
    pub shared_secret: String,
}

/// `POST /pair/initiate` (§4.6).
pub async fn pair_initiate(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let (pairing_token, expires_in) = state.pairing.initiate().await;
    Json(PairInitiateResponse { pairing_token, expires_in }).into_response()
}

/// `POST /pair/complete` (§4.6). Failures are a generic 400 — §7: "no
/// enumeration" of why a pairing attempt was rejected.
pub async fn pair_complete(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<PairCompleteRequest>,
) -> impl IntoResponse {
    match state
        .pairing
        .complete(&req.pairing_token, &req.verifier, &req.device_name, &state.devices)
        .await
    {
        Ok(completion) => Json(PairCompleteResponse {
            device_id: completion.device_id,
            auth_token: completion.auth_token,
            shared_secret: completion.shared_secret_hex,
        })
        .into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "pairing completion rejected");
            (StatusCode::BAD_REQUEST, "pairing failed").into_response()
        }
    }
}

// -- REST launch shortcuts (§6) -----------------------------------------------

/// `GET /l/*`, `/r/*`, `/run/*` — REST shortcut for a launch action.
/// Platform-specific dispatch is an external collaborator (spec §1); this
/// only forwards the virtual path to [`crate::static_assets::LaunchDispatcher`].
pub async fn launch_shortcut(State(state): State<Arc<ServerState>>, Path(path): Path<String>) -> Response {
    match state.launch_dispatcher.launch(&path).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "launch dispatch failed");
            crate::error::AppError::Internal.to_http_response(e.to_string()).into_response()
        }
    }
}

// -- Static app (§6) -----------------------------------------------------------

/// `GET /app`, `GET /app/` — serve the SPA's `index.html`.
pub async fn static_app_root(State(state): State<Arc<ServerState>>) -> Response {
    serve_asset(&state, "").await
}

/// `GET /app/*path` — serve a named asset, or fall back to `index.html`
/// (SPA fallback, §6) when the path doesn't match a real asset.
pub async fn static_app_path(State(state): State<Arc<ServerState>>, Path(path): Path<String>) -> Response {
    serve_asset(&state, &path).await
}

async fn serve_asset(state: &ServerState, path: &str) -> Response {
    let trimmed = path.trim_start_matches('/');
    if let Some(asset) = state.assets.get(trimmed).await {
        return build_asset_response(trimmed, asset);
    }
    // SPA fallback: re-serve index.html (with its own mtime) for any
    // unknown path under /app, per §6.
    match state.assets.get("index.html").await {
        Some(asset) => build_asset_response("index.html", asset),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn build_asset_response(path: &str, asset: crate::static_assets::Asset) -> Response {
    let cache_control =
        if path.is_empty() || path == "index.html" { "no-cache" } else { "public, max-age=3600" };
    let x_content_type_options = header::HeaderName::from_static("x-content-type-options");
    let mut response = (
        [
            (header::CONTENT_TYPE, asset.mime),
            (header::CACHE_CONTROL, cache_control),
        ],
        asset.bytes,
    )
        .into_response();
    response.headers_mut().insert(x_content_type_options, header::HeaderValue::from_static("nosniff"));
    if let Some(mtime) = asset.mtime {
        let http_date = httpdate_from_systemtime(mtime);
        if let Ok(value) = header::HeaderValue::from_str(&http_date) {
            response.headers_mut().insert(header::LAST_MODIFIED, value);
        }
    }
    response
}

/// Format a `SystemTime` as an HTTP-date (RFC 7231 §7.1.1.1), without
/// pulling in a dedicated date-formatting crate for one call site.
fn httpdate_from_systemtime(time: std::time::SystemTime) -> String {
    let secs = time.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    const DAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
    const MONTHS: [&str; 12] =
        ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    let days_since_epoch = secs / 86400;
    let day_of_week = DAYS[(days_since_epoch % 7) as usize];
    let (y, m, d) = civil_from_days(days_since_epoch as i64);
    let time_of_day = secs % 86400;
    format!(
        "{day_of_week}, {d:02} {} {y} {:02}:{:02}:{:02} GMT",
        MONTHS[(m - 1) as usize],
        time_of_day / 3600,
        (time_of_day / 60) % 60,
        time_of_day % 60
    )
}

/// Howard Hinnant's civil-from-days algorithm, proleptic Gregorian.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

// -- Debug (dev builds only, §6) ----------------------------------------------

/// `GET /debug/*` — minimal profiling surface, mounted only when
/// `config.dev` is set. A real implementation would wire in a profiling
/// crate (e.g. `pprof`); the core only needs the seam to exist and to stay
/// off by default in production builds.
pub async fn debug_info(State(state): State<Arc<ServerState>>, Path(path): Path<String>) -> Response {
    let readers = state.readers.read().await.len();
    Json(serde_json::json!({
        "path": path,
        "connected_readers": readers,
        "uptime_note": "profiling backend not wired; dev-mode placeholder",
    }))
    .into_response()
}

// -- Core-owned method handlers (§4.3, §6) ------------------------------------

/// Register the few method names the core can honestly answer itself
/// without an external domain layer.
pub async fn register_core_methods(registry: &MethodRegistry) -> anyhow::Result<()> {
    registry
        .register(
            "version",
            Arc::new(|_env, _params| {
                Box::pin(async move {
                    Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
                })
            }),
        )
        .await?;

    registry
        .register(
            "healthcheck",
            Arc::new(|_env, _params| Box::pin(async move { Ok(Value::String("ok".to_owned())) })),
        )
        .await?;

    registry
        .register(
            "readers",
            Arc::new(|env: RequestEnv, _params| {
                Box::pin(async move {
                    let readers = env.state.readers.read().await;
                    let list: Vec<Value> = readers
                        .values()
                        .map(|r| {
                            serde_json::json!({
                                "driver": r.driver_id,
                                "path": r.path,
                                "connected": r.reader.connected(),
                            })
                        })
                        .collect();
                    Ok(Value::Array(list))
                })
            }),
        )
        .await?;

    Ok(())
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

//! HTTP + streaming transport (§6): mounts the JSON-RPC dispatcher at the
//! versioned API paths, the pairing endpoints, the REST launch shortcuts,
//! and the static app, behind the origin/auth/rate-limit middleware stack
//! (§4.5).

pub mod auth;
pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::notify::SessionRegistry;
use crate::rpc::registry::MethodRegistry;
use crate::state::ServerState;

/// Axum router state: a thin pair of `Arc`s so handlers can extract
/// whichever one they need via [`FromRef`], without threading the session
/// registry through [`ServerState`] itself (the registry is a transport
/// concern, not shared application state).
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<ServerState>,
    pub sessions: Arc<SessionRegistry>,
}

impl FromRef<AppState> for Arc<ServerState> {
    fn from_ref(app: &AppState) -> Self {
        Arc::clone(&app.server)
    }
}

impl FromRef<AppState> for Arc<SessionRegistry> {
    fn from_ref(app: &AppState) -> Self {
        Arc::clone(&app.sessions)
    }
}

/// Build the axum `Router` with every route in §6's table.
pub fn build_router(state: Arc<ServerState>, sessions: Arc<SessionRegistry>) -> Router {
    let dev = state.config.dev;
    let app_state = AppState { server: Arc::clone(&state), sessions };

    let api = Router::new()
        .route("/api", get(ws::upgrade).post(http::rpc_post))
        .route("/api/v0", get(ws::upgrade).post(http::rpc_post))
        .route("/api/v0.1", get(ws::upgrade).post(http::rpc_post))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&state), auth::api_gate))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024));

    let mut router = Router::new()
        .merge(api)
        .route("/l/{*path}", get(http::launch_shortcut))
        .route("/r/{*path}", get(http::launch_shortcut))
        .route("/run/{*path}", get(http::launch_shortcut))
        .route("/app", get(http::static_app_root))
        .route("/app/", get(http::static_app_root))
        .route("/app/{*path}", get(http::static_app_path))
        .route("/health", get(http::health))
        .route("/pair/initiate", post(http::pair_initiate))
        .route("/pair/complete", post(http::pair_complete))
        .route("/", get(http::root_redirect));

    if dev {
        router = router.route("/debug/{*path}", get(http::debug_info));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(Arc::clone(&state), auth::origin_gate)),
        )
        .with_state(app_state)
}

/// Register the method names from §6's concrete-names table. The core owns
/// only registration, validation, and dispatch (§4.3) — real domain logic
/// (media library, settings store, playtime limits, …) lives in whatever
/// product wires a `zaparoo-core` instance up and is out of scope here
/// (spec §1). The handful the core *can* answer itself (process identity,
/// liveness, connected-reader introspection) are implemented directly;
/// everything else is a placeholder that proves the registry accepts and
/// routes the name, matching the "pluggable" framing in §4.3.
pub async fn register_builtin_methods(registry: &MethodRegistry) -> anyhow::Result<()> {
    http::register_core_methods(registry).await?;

    const EXTERNAL_METHODS: &[&str] = &[
        "run",
        "stop",
        "tokens",
        "history",
        "media",
        "media.generate",
        "media.generate.cancel",
        "media.index",
        "media.search",
        "media.tags",
        "media.active",
        "media.active.update",
        "settings",
        "settings.update",
        "settings.reload",
        "settings.logs.download",
        "playtime.limits",
        "playtime.limits.update",
        "playtime",
        "systems",
        "launchers.refresh",
        "mappings",
        "mappings.new",
        "mappings.delete",
        "mappings.update",
        "mappings.reload",
        "readers.write",
        "readers.write.cancel",
        "inbox",
        "inbox.delete",
        "inbox.clear",
    ];
    for name in EXTERNAL_METHODS {
        let name = (*name).to_owned();
        let handler: crate::rpc::registry::Handler = Arc::new(move |_env, _params| {
            let name = name.clone();
            Box::pin(async move {
                anyhow::bail!("{name}: not implemented by zaparoo-core (external handler required)")
            })
        });
        registry.register(name.as_str(), handler).await?;
    }
    Ok(())
}

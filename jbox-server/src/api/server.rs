//! HTTP server setup and routing

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::identity::HostIdentity;
use crate::error::{Error, Result};
use crate::state::SharedState;

/// Shared application context passed to all handlers
///
/// Implements Clone, which gives `FromRef<AppContext>` for free via Axum's
/// blanket implementation so the `Caller` extractor can reach `identity`.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub identity: Arc<HostIdentity>,
}

impl AppContext {
    pub fn new(state: Arc<SharedState>, identity: HostIdentity) -> Self {
        Self {
            state,
            identity: Arc::new(identity),
        }
    }
}

/// Build the application router
pub fn build_router(ctx: AppContext) -> Router {
    use super::handlers;

    Router::new()
        .route("/health", get(handlers::health))

        // Guest identity
        .route("/api/user/info", get(handlers::user_info))
        .route("/api/user/setname", post(handlers::set_username))
        .route("/api/user/quota", get(handlers::user_quota))
        .route("/api/user/all", get(handlers::all_users))

        // Queue
        .route("/api/queue", get(handlers::get_queue))
        .route("/api/queue/history", get(handlers::get_history))
        .route("/api/queue/add", post(handlers::add_to_queue))
        .route("/api/queue/next", post(handlers::play_next))
        .route("/api/queue/previous", post(handlers::play_previous))
        .route("/api/queue/clear", post(handlers::clear_queue))
        .route("/api/queue/move", post(handlers::move_song))
        .route("/api/queue/promote", post(handlers::promote_song))
        .route("/api/queue/:queue_id", delete(handlers::remove_from_queue))

        // Host administration
        .route("/api/admin/check", get(handlers::admin_check))
        .route("/api/admin/promote-history", get(handlers::promote_history))
        .route("/api/admin/clear-promote-history", post(handlers::clear_promote_history))
        .route("/api/admin/quota", get(handlers::get_quota_config).post(handlers::update_quota_config))

        // Player page heartbeat
        .route("/api/player/heartbeat", post(handlers::player_heartbeat))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // LAN clients load the UI from other origins
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run(
    addr: &str,
    ctx: AppContext,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(ctx);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;
    info!("Starting HTTP server on {}", addr);

    // Peer addresses feed identity resolution
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}

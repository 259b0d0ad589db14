//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

use turnstile_core::session::{ConversationEngine, WarmStore};

use crate::gateway::Gateway;
use crate::http::handlers;

/// Build the admin router over a running gateway.
pub fn build_router<E: ConversationEngine, W: WarmStore>(gateway: Arc<Gateway<E, W>>) -> Router {
    let api_routes = Router::new()
        .route("/stats", get(handlers::stats::get_stats::<E, W>))
        .route(
            "/sessions",
            get(handlers::session::list_sessions::<E, W>)
                .delete(handlers::session::clear_all::<E, W>),
        )
        .route(
            "/sessions/{room_id}/{persona_id}",
            delete(handlers::session::clear_session::<E, W>),
        )
        .route(
            "/sessions/{room_id}/{persona_id}/turns",
            post(handlers::session::run_turn::<E, W>),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

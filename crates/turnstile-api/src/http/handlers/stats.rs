//! Gate statistics endpoint.
//!
//! GET /api/v1/stats - Gate counters plus the hot-session count.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use turnstile_core::session::{ConversationEngine, WarmStore};
use turnstile_types::stats::GateStats;

use crate::gateway::Gateway;
use crate::http::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct StatsView {
    #[serde(flatten)]
    pub gate: GateStats,
    pub hot_sessions: usize,
}

/// GET /api/v1/stats
pub async fn get_stats<E: ConversationEngine, W: WarmStore>(
    State(gateway): State<Arc<Gateway<E, W>>>,
) -> Json<ApiResponse<StatsView>> {
    let start = Instant::now();
    let view = StatsView {
        gate: gateway.stats(),
        hot_sessions: gateway.store().hot_len(),
    };
    Json(ApiResponse::success(view, start))
}

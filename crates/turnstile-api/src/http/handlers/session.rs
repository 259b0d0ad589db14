//! Session management HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/v1/sessions                                - List hot sessions
//! - DELETE /api/v1/sessions                                - Clear every session
//! - DELETE /api/v1/sessions/{room_id}/{persona_id}         - Clear one session
//! - POST   /api/v1/sessions/{room_id}/{persona_id}/turns   - Run one turn

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use turnstile_core::session::{ConversationEngine, WarmStore};
use turnstile_types::session::{ClearReport, SessionKey, SessionSummary, Tier};

use crate::gateway::Gateway;
use crate::http::error::AppError;
use crate::http::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct ClearedView {
    pub key: SessionKey,
    /// Whether anything existed to clear.
    pub cleared: bool,
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct TurnView {
    pub output: String,
    pub tier: Tier,
    pub turn_count: u64,
    pub recovered_stale: bool,
}

/// GET /api/v1/sessions
pub async fn list_sessions<E: ConversationEngine, W: WarmStore>(
    State(gateway): State<Arc<Gateway<E, W>>>,
) -> Json<ApiResponse<Vec<SessionSummary>>> {
    let start = Instant::now();
    Json(ApiResponse::success(gateway.store().sessions(), start))
}

/// DELETE /api/v1/sessions
pub async fn clear_all<E: ConversationEngine, W: WarmStore>(
    State(gateway): State<Arc<Gateway<E, W>>>,
) -> Json<ApiResponse<ClearReport>> {
    let start = Instant::now();
    let report = gateway.store().clear_all().await;
    Json(ApiResponse::success(report, start))
}

/// DELETE /api/v1/sessions/{room_id}/{persona_id}
///
/// Responds 409 when a turn holds the session past the lock timeout.
pub async fn clear_session<E: ConversationEngine, W: WarmStore>(
    State(gateway): State<Arc<Gateway<E, W>>>,
    Path((room_id, persona_id)): Path<(i64, String)>,
) -> Result<Json<ApiResponse<ClearedView>>, AppError> {
    let start = Instant::now();
    let key = SessionKey::new(room_id, persona_id);
    let cleared = gateway.store().clear_key(&key).await?;
    Ok(Json(ApiResponse::success(ClearedView { key, cleared }, start)))
}

/// POST /api/v1/sessions/{room_id}/{persona_id}/turns
pub async fn run_turn<E: ConversationEngine, W: WarmStore>(
    State(gateway): State<Arc<Gateway<E, W>>>,
    Path((room_id, persona_id)): Path<(i64, String)>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<ApiResponse<TurnView>>, AppError> {
    let start = Instant::now();
    if request.input.trim().is_empty() {
        return Err(AppError::Validation("input must not be empty".to_string()));
    }

    let key = SessionKey::new(room_id, persona_id);
    let outcome = gateway.run_turn(&key, &request.input).await?;
    let view = TurnView {
        output: outcome.output,
        tier: outcome.tier,
        turn_count: outcome.turn_count,
        recovered_stale: outcome.recovered_stale,
    };
    Ok(Json(ApiResponse::success(view, start)))
}

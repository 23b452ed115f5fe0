// [apps/relay/src/handlers/health.rs]
//! Superficie de salud: estado del proceso y conteos de cola por estado.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::state::AppState;

pub async fn handle_health(State(application_state): State<AppState>) -> impl IntoResponse {
    match application_state.metrics().queue_counters().await {
        Ok(counters) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "pending_messages": counters.pending_messages,
                "failed_messages": counters.failed_messages,
                "dead_messages": counters.dead_messages,
                "total_readings": counters.total_readings,
            })),
        )
            .into_response(),
        Err(database_fault) => {
            error!("❌ [HEALTH]: Ledger inaccesible: {}", database_fault);
            (StatusCode::INTERNAL_SERVER_ERROR, database_fault.to_string()).into_response()
        }
    }
}

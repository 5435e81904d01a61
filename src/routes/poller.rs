//! Poller status HTTP endpoint.
//!
//! GET /api/v1/poller/status: returns the current state of the background
//! poller as JSON.

use axum::extract::State;
use axum::Json;

use crate::services::poller::{PollerState, SharedPollerState};

/// Get the current poller status.
///
/// Returns cycle bookkeeping (total_cycles, last_cycle_completed_at,
/// next_wakeup_at, active) and the outcome of the last cycle: batch size,
/// skipped targets with their errors, and any catalog or store failure.
#[utoipa::path(
    get,
    path = "/api/v1/poller/status",
    tag = "Poller",
    responses(
        (status = 200, description = "Current poller status", body = PollerState),
    )
)]
pub async fn get_poller_status(State(state): State<SharedPollerState>) -> Json<PollerState> {
    let s = state.read().await;
    Json(s.clone())
}

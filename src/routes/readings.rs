//! Latest readings endpoint.
//!
//! GET /api/v1/readings/latest: the records of the most recent non-empty
//! batch, one per target, for live map views.

use axum::extract::State;
use axum::Json;

use crate::errors::{AppError, ErrorResponse};
use crate::services::poller::SharedPollerState;
use crate::store::models::Record;

/// Get the most recent batch of derived readings.
#[utoipa::path(
    get,
    path = "/api/v1/readings/latest",
    tag = "Readings",
    responses(
        (status = 200, description = "Records of the latest non-empty batch, in catalog order", body = Vec<Record>),
        (status = 404, description = "No batch has been collected yet", body = ErrorResponse),
    )
)]
pub async fn get_latest_readings(
    State(state): State<SharedPollerState>,
) -> Result<Json<Vec<Record>>, AppError> {
    let s = state.read().await;
    if s.latest_records.is_empty() {
        return Err(AppError::NotFound(
            "No readings collected yet".to_string(),
        ));
    }
    Ok(Json(s.latest_records.clone()))
}

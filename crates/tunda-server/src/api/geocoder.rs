use axum::{extract::State, Extension, Json};
use tunda_delivery::EngineUsage;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState};

/// Geocoder rate-limit windows plus cache and fallback tallies.
pub(super) async fn usage(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<EngineUsage>> {
    ApiResponse::new(state.engine.usage(), req_id.0)
}

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use tunda_delivery::{ValidationRequest, ValidationResult};

use crate::middleware::RequestId;

use super::{json_body, ApiError, ApiResponse, AppState};

/// Advisory address check without a fee computation.
pub(super) async fn validate_address(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<ValidationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ValidationResult>>, ApiError> {
    let request = json_body(&req_id.0, payload)?;
    let ctx = state.engine.context();
    let result = state.engine.validate_address(&request, &ctx).await;
    Ok(ApiResponse::new(result, req_id.0))
}

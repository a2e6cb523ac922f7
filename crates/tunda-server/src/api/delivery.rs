use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use tunda_delivery::{AutocompleteSuggestion, FeeQuote, FeeRequest, DEFAULT_SUGGESTION_LIMIT};

use crate::middleware::RequestId;

use super::{json_body, map_delivery_error, ApiError, ApiResponse, AppState};

const MAX_SUGGESTION_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub(super) struct AutocompleteQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

pub(super) async fn compute_fee(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<FeeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<FeeQuote>>, ApiError> {
    let request = json_body(&req_id.0, payload)?;
    let ctx = state.engine.context();
    let quote = state
        .engine
        .quote(&request, &ctx)
        .await
        .map_err(|e| map_delivery_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(quote, req_id.0))
}

pub(super) async fn autocomplete(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<AutocompleteQuery>,
) -> Json<ApiResponse<Vec<AutocompleteSuggestion>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
        .min(MAX_SUGGESTION_LIMIT);
    ApiResponse::new(state.engine.autocomplete(&query.q, limit), req_id.0)
}

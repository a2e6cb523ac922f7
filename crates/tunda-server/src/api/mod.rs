mod addresses;
mod delivery;
mod geocoder;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tunda_delivery::{DeliveryEngine, DeliveryError};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DeliveryEngine>,
    /// `None` when the server runs without a database (tests, offline demos).
    pub pool: Option<PgPool>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    geocoder: bool,
}

impl HealthData {
    fn up(database: &'static str, geocoder: bool) -> Self {
        Self {
            status: "ok",
            database,
            geocoder,
        }
    }
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_delivery_error(request_id: String, error: &DeliveryError) -> ApiError {
    match error {
        DeliveryError::InvalidInput { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        DeliveryError::Config(e) => {
            tracing::error!(error = %e, "delivery settings are invalid");
            ApiError::new(request_id, "config_error", error.to_string())
        }
    }
}

/// Unwraps a JSON body, turning a rejection into a `validation_error`.
pub(super) fn json_body<T>(
    request_id: &str,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::new(request_id, "validation_error", e.body_text()))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/delivery/fee", post(delivery::compute_fee))
        .route(
            "/api/v1/delivery/autocomplete",
            get(delivery::autocomplete),
        )
        .route(
            "/api/v1/addresses/validate",
            post(addresses::validate_address),
        )
        .route(
            "/api/v1/settings/delivery",
            get(settings::delivery_settings),
        )
        .route("/api/v1/settings/{key}", get(settings::get_setting))
        .route("/api/v1/geocoder/usage", get(geocoder::usage))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let geocoder = state
        .engine
        .usage()
        .geocoder
        .is_some_and(|u| u.api_available);

    let (status, data) = match &state.pool {
        None => (StatusCode::OK, HealthData::up("not_configured", geocoder)),
        Some(pool) => match tunda_db::health_check(pool).await {
            Ok(()) => (StatusCode::OK, HealthData::up("ok", geocoder)),
            Err(e) => {
                tracing::warn!(error = %e, "health check: database unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                        geocoder,
                    },
                )
            }
        },
    };
    (status, ApiResponse::new(data, req_id.0))
}

/// 120 requests per minute across the protected routes.
pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests;

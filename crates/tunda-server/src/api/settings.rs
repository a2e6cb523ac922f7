use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use tunda_core::{DeliverySettings, SettingType, SettingValue, SettingsStore};

use crate::middleware::RequestId;

use super::{map_delivery_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct SettingItem {
    key: String,
    #[serde(rename = "type")]
    setting_type: SettingType,
    value: SettingValue,
}

pub(super) async fn delivery_settings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<DeliverySettings>>, ApiError> {
    let settings = state
        .engine
        .delivery_settings()
        .await
        .map_err(|e| map_delivery_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(settings, req_id.0))
}

/// One setting with its display value; unknown keys return `null` data.
pub(super) async fn get_setting(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<Option<SettingItem>>>, ApiError> {
    let record = state
        .engine
        .settings_store()
        .fetch(&key)
        .await
        .map_err(|e| {
            tracing::error!(key, error = %e, "settings read failed");
            ApiError::new(req_id.0.clone(), "internal_error", "settings read failed")
        })?;

    let item = record.map(|record| SettingItem {
        value: record.typed_value_lossy(),
        setting_type: record.setting_type,
        key: record.key,
    });
    Ok(ApiResponse::new(item, req_id.0))
}

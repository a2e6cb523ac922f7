use std::path::Path;

use serde_json::json;
use tunda_core::{DeliveryAddress, LegacyLocation, StructuredAddress};
use tunda_delivery::{DeliveryEngine, FeeRequest};

/// Read a fee request from `path`, quote it and print the result as JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the request is
/// rejected as invalid.
pub(crate) async fn run_quote(engine: &DeliveryEngine, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let request = parse_fee_request(&raw)?;

    let quote = engine.quote(&request, &engine.context()).await?;
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

pub(crate) fn parse_fee_request(raw: &str) -> anyhow::Result<FeeRequest> {
    serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("invalid fee request: {e}"))
}

/// Resolve `text` through the strategy ladder and print where it landed.
///
/// # Errors
///
/// Returns an error when a region id is unknown or the pair is inconsistent.
pub(crate) async fn run_geocode(
    engine: &DeliveryEngine,
    text: &str,
    sub_county_id: Option<i64>,
    county_id: Option<i64>,
) -> anyhow::Result<()> {
    let address = address_from_args(text, sub_county_id, county_id);
    let resolved = engine.resolve_address(&address, &engine.context()).await?;

    let output = json!({
        "input": text,
        "address_used": resolved.address_used,
        "latitude": resolved.coords.lat,
        "longitude": resolved.coords.lon,
        "confidence": resolved.confidence,
        "strategy": resolved.strategy,
        "strategy_description": resolved.strategy.description(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Both ids select the structured shape; anything less is a legacy record.
pub(crate) fn address_from_args(
    text: &str,
    sub_county_id: Option<i64>,
    county_id: Option<i64>,
) -> DeliveryAddress {
    match (sub_county_id, county_id) {
        (Some(sub_county_id), Some(county_id)) => DeliveryAddress::Structured(StructuredAddress {
            detailed_address: text.to_string(),
            sub_county_id,
            county_id,
            full_name: None,
            phone: None,
            latitude: None,
            longitude: None,
        }),
        (sub_county_id, county_id) => DeliveryAddress::Legacy(LegacyLocation {
            detailed_address: Some(text.to_string()),
            sub_county_id,
            county_id,
            ..LegacyLocation::default()
        }),
    }
}

/// # Errors
///
/// Returns an error when a stored delivery setting is invalid.
pub(crate) async fn run_settings(engine: &DeliveryEngine) -> anyhow::Result<()> {
    let settings = engine.delivery_settings().await?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

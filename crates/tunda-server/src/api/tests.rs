use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use tunda_core::{Coordinates, County, InMemorySettings, RegionDirectory, SubCounty, KENYA};
use tunda_delivery::{DeliveryEngine, EngineConfig, LandmarkStore, ScriptedBackend};

use super::*;

const FARM: Coordinates = Coordinates::new(-1.2676, 36.8108);
const HOME: Coordinates = Coordinates::new(-1.3100, 36.8200);

fn regions() -> RegionDirectory {
    RegionDirectory::new(
        vec![County {
            id: 1,
            name: "Nairobi".to_string(),
            code: "NRB".to_string(),
        }],
        vec![
            SubCounty {
                id: 1,
                county_id: 1,
                name: "Westlands".to_string(),
                code: "WLD".to_string(),
            },
            SubCounty {
                id: 5,
                county_id: 1,
                name: "Langata".to_string(),
                code: "LNG".to_string(),
            },
        ],
    )
}

fn state() -> AppState {
    let backend = ScriptedBackend::new()
        .with_geocode("Westlands, Nairobi, Kenya", FARM)
        .with_distance(FARM, HOME, 5.0);
    let engine = DeliveryEngine::new(
        EngineConfig::default(),
        KENYA,
        Arc::new(backend),
        Arc::new(InMemorySettings::with_defaults()),
        Arc::new(regions()),
        Arc::new(LandmarkStore::with_defaults(KENYA)),
    );
    AppState {
        engine: Arc::new(engine),
        pool: None,
    }
}

fn app() -> Router {
    let auth = AuthState::from_keys("", true).expect("auth");
    build_app(state(), auth, default_rate_limit_state())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).expect("json parse");
    (status, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn fee_body(quantity: &str) -> Value {
    json!({
        "cart_items": [{
            "listing_ref": 1,
            "quantity": quantity,
            "unit_price": "100",
            "farm": { "farm_id": 7, "sub_county_id": 1, "county_id": 1 },
            "unit_of_measure": "kg"
        }],
        "delivery_address": {
            "type": "coordinates",
            "latitude": HOME.lat,
            "longitude": HOME.lon
        }
    })
}

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("decimal parses")
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn api_error_config_error_maps_to_internal_error() {
    let response = ApiError::new("req-1", "config_error", "bad setting").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_without_database_is_ok() {
    let (status, json) = send(app(), get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["database"], "not_configured");
}

#[tokio::test]
async fn fee_endpoint_returns_quote() {
    let (status, json) = send(app(), post_json("/api/v1/delivery/fee", &fee_body("5"))).await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(decimal(&data["total_fee"]), Decimal::from(75));
    assert_eq!(decimal(&data["subtotal"]), Decimal::from(500));
    assert_eq!(data["calculation_details"]["calculation_method"], "driving");
    assert_eq!(data["address_resolution"]["strategy_used"], "direct");
    assert_eq!(data["is_free_delivery"], false);
    assert!(json["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn fee_endpoint_rejects_bad_quantity() {
    let (status, json) = send(app(), post_json("/api/v1/delivery/fee", &fee_body("0"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("cart_items[0].quantity"));
}

#[tokio::test]
async fn fee_endpoint_rejects_malformed_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/delivery/fee")
        .header("content-type", "application/json")
        .body(Body::from("{\"cart_items\": ["))
        .expect("request");
    let (status, json) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn autocomplete_lists_landmarks_first() {
    let (status, json) = send(app(), get("/api/v1/delivery/autocomplete?q=west&limit=3")).await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().expect("data array");
    assert_eq!(data.len(), 3);
    assert_eq!(data[0]["text"], "Westgate");
    assert_eq!(data[0]["type"], "landmark");
    assert_eq!(data[2]["type"], "sub_county");
}

#[tokio::test]
async fn validate_flags_landmark_mismatch() {
    let body = json!({
        "detailed_address": "Westgate Mall, Mwanzi Road",
        "sub_county_id": 5,
        "county_id": 1
    });
    let (status, json) = send(app(), post_json("/api/v1/addresses/validate", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["is_valid"], true);
    assert_eq!(json["data"]["mismatch_detected"], true);
    assert_eq!(json["data"]["detected_location"]["method"], "landmarks");
}

#[tokio::test]
async fn settings_routes_return_typed_values() {
    let (status, json) = send(app(), get("/api/v1/settings/delivery")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["data"]["base_delivery_fee"]), Decimal::from(50));

    let (status, json) = send(app(), get("/api/v1/settings/delivery_fee_per_km")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["key"], "delivery_fee_per_km");
    assert_eq!(json["data"]["type"], "number");

    let (status, json) = send(app(), get("/api/v1/settings/no_such_key")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].is_null());
}

#[tokio::test]
async fn usage_reports_counters_after_a_quote() {
    let app = app();
    let (status, _) = send(
        app.clone(),
        post_json("/api/v1/delivery/fee", &fee_body("5")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(app, get("/api/v1/geocoder/usage")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["counters"]["quotes"], 1);
    assert_eq!(json["data"]["distance_cache"]["entries"], 1);
    assert!(json["data"]["geocoder"].is_null());
}

#[tokio::test]
async fn protected_routes_require_bearer_when_enabled() {
    let auth = AuthState::from_keys("secret", false).expect("auth");
    let app = build_app(state(), auth, default_rate_limit_state());

    let (status, json) = send(app.clone(), get("/api/v1/settings/delivery")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");

    let request = Request::builder()
        .uri("/api/v1/settings/delivery")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn inbound_rate_limit_rejects_excess_calls() {
    let auth = AuthState::from_keys("", true).expect("auth");
    let app = build_app(state(), auth, RateLimitState::new(1, Duration::from_secs(60)));

    let (status, _) = send(app.clone(), get("/api/v1/settings/delivery")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = send(app, get("/api/v1/settings/delivery")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
}

#[tokio::test]
async fn request_id_header_is_echoed() {
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .expect("request");
    let response = app().oneshot(request).await.expect("response");
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-42"
    );
}
